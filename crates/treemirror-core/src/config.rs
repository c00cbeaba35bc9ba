//! Configuration module for TreeMirror.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, validation defaults, and platform-appropriate paths.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration for TreeMirror.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mirror: MirrorConfig,
    pub walker: WalkerConfig,
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// What to mirror.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Display name of the remote folder that roots the mirror.
    pub root_name: String,
    /// MIME types that are never tracked (shortcuts, forms, ...).
    pub ignored_mime_types: Vec<String>,
}

/// Full-rebuild traversal settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkerConfig {
    /// Concurrent child-listing workers; 1 gives a sequential walk.
    pub workers: usize,
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the remote tree API.
    pub base_url: String,
    /// Environment variable holding the OAuth access token. Token
    /// acquisition and refresh are external to TreeMirror.
    pub access_token_env: String,
    /// Records requested per listing page.
    pub page_size: u32,
    /// Retry attempts for transient transport failures.
    pub max_retries: u32,
}

/// Record store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database. `None` selects the platform data dir.
    pub path: Option<PathBuf>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/treemirror/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("treemirror")
            .join("config.yaml")
    }

    /// Platform-appropriate default path for the record store database.
    ///
    /// Typically `$XDG_DATA_HOME/treemirror/mirror.db` on Linux, unless
    /// overridden in the `database` section.
    pub fn database_path(&self) -> PathBuf {
        self.database.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("treemirror")
                .join("mirror.db")
        })
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            root_name: "Google Photos".to_string(),
            ignored_mime_types: Vec::new(),
        }
    }
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.googleapis.com/drive/v3".to_string(),
            access_token_env: "TREEMIRROR_ACCESS_TOKEN".to_string(),
            page_size: 1000,
            max_retries: 3,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
