//! Mirror-root lookup tests: exact match, NotFound, Ambiguous

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use treemirror_core::ports::ITreeClient;

use crate::common::setup;

const ROOT_QUERY: &str =
    "name = 'Google Photos' and mimeType = 'application/vnd.google-apps.folder' and trashed = false";

#[tokio::test]
async fn test_root_by_name_single_match() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", ROOT_QUERY))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [{
                "id": "root-1",
                "name": "Google Photos",
                "mimeType": "application/vnd.google-apps.folder",
                "ownedByMe": true
            }]
        })))
        .mount(&server)
        .await;

    let root = client.root_by_name("Google Photos").await.unwrap();
    assert_eq!(root.id, "root-1");
    assert_eq!(root.name, "Google Photos");
    assert!(root.parent_ids.is_empty());
}

#[tokio::test]
async fn test_root_by_name_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": []
        })))
        .mount(&server)
        .await;

    let err = client.root_by_name("Google Photos").await.unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn test_root_by_name_ambiguous() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [
                {"id": "root-1", "name": "Google Photos"},
                {"id": "root-2", "name": "Google Photos"}
            ]
        })))
        .mount(&server)
        .await;

    let err = client.root_by_name("Google Photos").await.unwrap_err();
    assert!(err.to_string().contains("ambiguous"));
    assert!(err.to_string().contains('2'));
}

#[tokio::test]
async fn test_root_by_name_escapes_quotes() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param(
            "q",
            "name = 'Bob\\'s Files' and mimeType = 'application/vnd.google-apps.folder' and trashed = false",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [{"id": "root-b", "name": "Bob's Files"}]
        })))
        .mount(&server)
        .await;

    let root = client.root_by_name("Bob's Files").await.unwrap();
    assert_eq!(root.id, "root-b");
}
