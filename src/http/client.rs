//! API worker
//!
//! Executes exactly one tracker API call per invocation: a search page, an
//! approximate count, or a single-issue fetch. Every attempt first passes
//! through the shared rate limiter. Transient failures (connect errors,
//! timeouts, 5xx, 429) retry inside a bounded budget; other 4xx responses
//! fail immediately.

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::config::FetchConfig;
use crate::error::{Error, Result};
use crate::types::{Page, PageCursor, Record};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Wire shape of `GET /search`
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<Value>,
    #[serde(default)]
    total: u64,
    #[serde(rename = "isLast", default)]
    is_last: bool,
    #[serde(rename = "nextPageToken", default)]
    next_page_token: Option<String>,
}

impl SearchResponse {
    fn into_page(self) -> Page {
        Page {
            records: self.issues.into_iter().map(Record::new).collect(),
            total_reported: self.total,
            is_last: self.is_last,
            next_cursor: self.next_page_token.filter(|t| !t.is_empty()),
        }
    }
}

/// Wire shape of `POST /search/approximate-count`
#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

/// The request worker: one HTTP call with retry, backoff, and 429 handling.
///
/// Cloning is cheap; clones share the underlying connection pool and the
/// global rate limiter, so concurrent workers stay jointly paced.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: FetchConfig,
    rate_limiter: RateLimiter,
}

impl ApiClient {
    /// Create a worker for the given config
    pub fn new(config: FetchConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .expect("Failed to build HTTP client");

        let rate_limiter = RateLimiter::new(&RateLimiterConfig::new(config.min_interval));

        Self {
            client,
            config,
            rate_limiter,
        }
    }

    /// The config this worker was built with
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// The shared rate limiter
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Fetch one page of search results.
    ///
    /// `cursor` selects `startAt` or `nextPageToken` (mutually exclusive on
    /// the wire). `fields` narrows the record payload; `None` requests the
    /// server default.
    pub async fn search_page(
        &self,
        jql: &str,
        cursor: &PageCursor,
        max_results: u32,
        fields: Option<&[String]>,
    ) -> Result<Page> {
        let mut params = vec![
            ("jql".to_string(), jql.to_string()),
            ("maxResults".to_string(), max_results.to_string()),
        ];
        match cursor {
            PageCursor::Offset(offset) => {
                params.push(("startAt".to_string(), offset.to_string()));
            }
            PageCursor::Token(token) => {
                params.push(("nextPageToken".to_string(), token.clone()));
            }
        }
        if let Some(fields) = fields {
            params.push(("fields".to_string(), fields.join(",")));
        }

        let response = self
            .send_with_retry(Method::GET, "/search", &params, None)
            .await?;
        let parsed: SearchResponse = response.json().await.map_err(Error::Http)?;
        Ok(parsed.into_page())
    }

    /// Ask the server for its approximate match count. Advisory only.
    pub async fn approximate_count(&self, jql: &str) -> Result<u64> {
        let body = serde_json::json!({ "jql": jql });
        let response = self
            .send_with_retry(Method::POST, "/search/approximate-count", &[], Some(&body))
            .await?;
        let parsed: CountResponse = response.json().await.map_err(Error::Http)?;
        Ok(parsed.count)
    }

    /// Fetch a single issue by key or numeric id
    pub async fn fetch_issue(&self, key: &str, fields: Option<&[String]>) -> Result<Record> {
        let mut params = Vec::new();
        if let Some(fields) = fields {
            params.push(("fields".to_string(), fields.join(",")));
        }

        let path = format!("/issue/{key}");
        let result = self
            .send_with_retry(Method::GET, &path, &params, None)
            .await;
        match result {
            Ok(response) => {
                let value: Value = response.json().await.map_err(Error::Http)?;
                Ok(Record::new(value))
            }
            Err(Error::HttpStatus { status: 404, .. }) => Err(Error::IssueNotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    /// Issue one request with the full retry policy.
    ///
    /// A 429 consumes a retry attempt and sleeps for `Retry-After`, but does
    /// not advance the exponential backoff exponent; other transient
    /// failures advance both.
    async fn send_with_retry(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Response> {
        let url = self.build_url(path);
        let max_retries = self.config.max_retries;

        let mut attempt = 0;
        let mut backoff_attempt = 0;
        let mut last_error = None;

        while attempt <= max_retries {
            self.rate_limiter.wait().await;

            let mut req = self
                .client
                .request(method.clone(), &url)
                .timeout(self.config.timeout);
            if !params.is_empty() {
                req = req.query(params);
            }
            if let Some(body) = body {
                req = req.json(body);
            }
            if let Some(creds) = &self.config.credentials {
                req = req.basic_auth(&creds.user, Some(&creds.token));
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = extract_retry_after(&response)
                            .unwrap_or(self.config.retry_after_default);
                        if attempt < max_retries {
                            warn!(
                                "Rate limited (429), attempt {}/{}, waiting {:?}",
                                attempt + 1,
                                max_retries + 1,
                                retry_after
                            );
                            tokio::time::sleep(retry_after).await;
                            attempt += 1;
                            continue;
                        }
                        return Err(Error::RateLimited {
                            retry_after_seconds: retry_after.as_secs(),
                        });
                    }

                    if status.is_server_error() {
                        if attempt < max_retries {
                            let delay = self.backoff_delay(backoff_attempt);
                            warn!(
                                "Request failed with {}, attempt {}/{}, retrying in {:?}",
                                status.as_u16(),
                                attempt + 1,
                                max_retries + 1,
                                delay
                            );
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                            backoff_attempt += 1;
                            last_error = Some(Error::HttpStatus {
                                status: status.as_u16(),
                                body: String::new(),
                            });
                            continue;
                        }
                        let body = response.text().await.unwrap_or_default();
                        return Err(Error::http_status(status.as_u16(), body));
                    }

                    if status.is_client_error() {
                        // Non-transient; no retry
                        let body = response.text().await.unwrap_or_default();
                        return Err(Error::http_status(status.as_u16(), body));
                    }

                    debug!("Request succeeded: {} {}", method, url);
                    return Ok(response);
                }
                Err(e) => {
                    let transient = e.is_timeout() || e.is_connect();
                    if transient && attempt < max_retries {
                        let delay = self.backoff_delay(backoff_attempt);
                        warn!(
                            "Transport error ({e}), attempt {}/{}, retrying in {:?}",
                            attempt + 1,
                            max_retries + 1,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        backoff_attempt += 1;
                        last_error = Some(if e.is_timeout() {
                            Error::Timeout {
                                timeout_ms: self.config.timeout.as_millis() as u64,
                            }
                        } else {
                            Error::Http(e)
                        });
                        continue;
                    }

                    if e.is_timeout() {
                        return Err(Error::Timeout {
                            timeout_ms: self.config.timeout.as_millis() as u64,
                        });
                    }
                    return Err(Error::Http(e));
                }
            }
        }

        Err(last_error.unwrap_or(Error::MaxRetriesExceeded { max_retries }))
    }

    /// Exponential backoff delay for a given attempt, capped
    fn backoff_delay(&self, backoff_attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(backoff_attempt);
        std::cmp::min(
            self.config.initial_backoff.saturating_mul(factor),
            self.config.max_backoff,
        )
    }

    fn build_url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url)
            .field("has_credentials", &self.config.credentials.is_some())
            .finish_non_exhaustive()
    }
}

/// Parse the Retry-After header as delay seconds
fn extract_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
