//! Google Drive API client
//!
//! Provides a typed HTTP client for the Drive v3 REST API. Handles
//! authentication headers, JSON deserialization, endpoint construction, and
//! bounded retry with exponential backoff for transient failures.
//!
//! ## Retry Logic
//!
//! Network-level failures (connect, timeout), HTTP 429, and HTTP 5xx are
//! retried with exponential backoff: 500ms, 1s, 2s, ... up to the configured
//! attempt bound. Everything else propagates immediately; in particular the
//! statuses that signal an expired change token must reach the caller
//! untouched so the sync layer can fall back to a rebuild.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::DriveError;

/// Base URL for the Google Drive v3 API
const DRIVE_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

/// Base delay for exponential backoff
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Default retry attempts for transient errors
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default records requested per listing page
const DEFAULT_PAGE_SIZE: u32 = 1000;

/// HTTP client for Google Drive API calls
///
/// Wraps `reqwest::Client` with bearer authentication and base URL
/// construction. Token acquisition and refresh are external; the client
/// only carries a ready access token.
pub struct DriveClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests
    base_url: String,
    /// Current OAuth2 access token
    access_token: String,
    /// Records requested per listing page
    page_size: u32,
    /// Retry attempts for transient errors
    max_retries: u32,
}

impl DriveClient {
    /// Creates a new DriveClient with the given access token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: DRIVE_BASE_URL.to_string(),
            access_token: access_token.into(),
            page_size: DEFAULT_PAGE_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Creates a new DriveClient with a custom base URL (useful for testing)
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            access_token: access_token.into(),
            page_size: DEFAULT_PAGE_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Sets the listing page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the retry bound for transient errors
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Returns the configured listing page size
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Creates an authenticated request builder for the given method and path
    ///
    /// Automatically prepends the base URL and adds the Authorization header.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, url)
            .bearer_auth(&self.access_token)
    }

    /// Sends a GET request with query parameters, retrying transient
    /// failures, and decodes the JSON response
    ///
    /// # Arguments
    /// * `path` - API path relative to the base URL (e.g. "/files")
    /// * `query` - Query string parameters
    /// * `operation` - Short name for diagnostics and error values
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        operation: &'static str,
    ) -> Result<T, DriveError> {
        let mut attempt: u32 = 0;

        loop {
            let response = self
                .request(Method::GET, path)
                .query(query)
                .send()
                .await;

            match response {
                Err(source) => {
                    if attempt < self.max_retries {
                        self.backoff(operation, attempt, &format!("{source}")).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(DriveError::Transport { operation, source });
                }
                Ok(response) => {
                    let status = response.status();

                    if Self::is_transient_status(status) {
                        if attempt < self.max_retries {
                            self.backoff(operation, attempt, &format!("HTTP {status}"))
                                .await;
                            attempt += 1;
                            continue;
                        }
                        return Err(DriveError::Api { operation, status });
                    }

                    if !status.is_success() {
                        return Err(DriveError::Api { operation, status });
                    }

                    if attempt > 0 {
                        debug!(operation, attempt, "Request succeeded after retry");
                    }

                    return response
                        .json()
                        .await
                        .map_err(|source| DriveError::Decode { operation, source });
                }
            }
        }
    }

    /// Statuses retried with backoff: rate limiting and server errors
    fn is_transient_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    async fn backoff(&self, operation: &str, attempt: u32, cause: &str) {
        let delay = Duration::from_millis(RETRY_BASE_DELAY_MS * 2u64.pow(attempt));
        warn!(
            operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            cause,
            "Transient error, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
