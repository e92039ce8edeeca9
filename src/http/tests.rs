//! Tests for the HTTP worker

use super::*;
use crate::config::FetchConfig;
use crate::error::Error;
use crate::types::PageCursor;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base_url: String) -> FetchConfig {
    FetchConfig::new(base_url)
        .with_min_interval(Duration::ZERO)
        .with_backoff(Duration::from_millis(10), Duration::from_millis(100))
}

#[tokio::test]
async fn test_search_page_parses_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("jql", "project = PROJ"))
        .and(query_param("startAt", "0"))
        .and(query_param("maxResults", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "issues": [
                {"id": "10001", "key": "PROJ-1"},
                {"id": "10002", "key": "PROJ-2"}
            ],
            "total": 5,
            "isLast": false,
            "nextPageToken": "tok-abc"
        })))
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(test_config(mock_server.uri()));
    let page = client
        .search_page("project = PROJ", &PageCursor::start(), 2, None)
        .await
        .unwrap();

    assert_eq!(page.len(), 2);
    assert_eq!(page.total_reported, 5);
    assert!(!page.is_last);
    assert_eq!(page.next_cursor.as_deref(), Some("tok-abc"));
    assert_eq!(page.records[0].key(), Some("PROJ-1"));
}

#[tokio::test]
async fn test_search_page_with_token_cursor() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("nextPageToken", "tok-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "issues": [{"id": "10003"}],
            "total": 5,
            "isLast": true
        })))
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(test_config(mock_server.uri()));
    let page = client
        .search_page(
            "project = PROJ",
            &PageCursor::Token("tok-abc".to_string()),
            50,
            None,
        )
        .await
        .unwrap();

    assert_eq!(page.len(), 1);
    assert!(page.is_last);
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn test_search_page_sends_field_list() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("fields", "summary,status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "issues": [],
            "total": 0,
            "isLast": true
        })))
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(test_config(mock_server.uri()));
    let fields = vec!["summary".to_string(), "status".to_string()];
    let page = client
        .search_page("", &PageCursor::start(), 100, Some(&fields))
        .await
        .unwrap();

    assert!(page.is_empty());
}

#[tokio::test]
async fn test_search_page_defaults_for_sparse_response() {
    let mock_server = MockServer::start().await;

    // Some servers omit isLast / nextPageToken entirely
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "issues": [{"id": "1"}]
        })))
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(test_config(mock_server.uri()));
    let page = client
        .search_page("", &PageCursor::start(), 100, None)
        .await
        .unwrap();

    assert_eq!(page.len(), 1);
    assert_eq!(page.total_reported, 0);
    assert!(!page.is_last);
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn test_approximate_count() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search/approximate-count"))
        .and(body_json(serde_json::json!({"jql": "project = PROJ"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"count": 321})))
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(test_config(mock_server.uri()));
    assert_eq!(client.approximate_count("project = PROJ").await.unwrap(), 321);
}

#[tokio::test]
async fn test_fetch_issue() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/issue/PROJ-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "10007",
            "key": "PROJ-7",
            "fields": {"summary": "it lives"}
        })))
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(test_config(mock_server.uri()));
    let record = client.fetch_issue("PROJ-7", None).await.unwrap();
    assert_eq!(record.key(), Some("PROJ-7"));
}

#[tokio::test]
async fn test_fetch_issue_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/issue/PROJ-404"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such issue"))
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(test_config(mock_server.uri()));
    let err = client.fetch_issue("PROJ-404", None).await.unwrap_err();
    assert!(matches!(err, Error::IssueNotFound { key } if key == "PROJ-404"));
}

#[tokio::test]
async fn test_retry_on_500_then_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "issues": [],
            "total": 0,
            "isLast": true
        })))
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(test_config(mock_server.uri()));
    let page = client
        .search_page("", &PageCursor::start(), 100, None)
        .await
        .unwrap();
    assert!(page.is_empty());
}

#[tokio::test]
async fn test_client_error_fails_without_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad jql"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(test_config(mock_server.uri()));
    let err = client
        .search_page("broken (", &PageCursor::start(), 100, None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 400, .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_retries_exhausted_surfaces_transport_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = test_config(mock_server.uri()).with_max_retries(2);
    let client = ApiClient::new(config);
    let err = client
        .search_page("", &PageCursor::start(), 100, None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 503, .. }));
}

#[tokio::test]
async fn test_429_honors_retry_after() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "1")
                .set_body_string("slow down"),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "issues": [],
            "total": 0,
            "isLast": true
        })))
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(test_config(mock_server.uri()));
    let start = Instant::now();
    client
        .search_page("", &PageCursor::start(), 100, None)
        .await
        .unwrap();

    // The second attempt must wait out the advertised Retry-After
    assert!(start.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_429_exhausted_returns_rate_limited() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .mount(&mock_server)
        .await;

    let config = test_config(mock_server.uri()).with_max_retries(1);
    let client = ApiClient::new(config);
    let err = client
        .search_page("", &PageCursor::start(), 100, None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RateLimited { .. }));
}

#[tokio::test]
async fn test_basic_auth_applied() {
    let mock_server = MockServer::start().await;

    // dev@example.com:secret
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(wiremock::matchers::header(
            "Authorization",
            "Basic ZGV2QGV4YW1wbGUuY29tOnNlY3JldA==",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "issues": [],
            "total": 0,
            "isLast": true
        })))
        .mount(&mock_server)
        .await;

    let config = test_config(mock_server.uri()).with_credentials("dev@example.com", "secret");
    let client = ApiClient::new(config);
    client
        .search_page("", &PageCursor::start(), 100, None)
        .await
        .unwrap();
}
