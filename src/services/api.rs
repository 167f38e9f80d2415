// src/services/api.rs

//! Authenticated, retrying, paginating client for the feed API.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::FeedSource;
use super::retry::{Retryable, RetryPolicy};
use crate::error::{AppError, Result};
use crate::models::{ApiConfig, Entry, Feed, Topic, UserSubscriptions};
use crate::utils::{http, join_segments};

/// Hard page-size ceiling enforced by the server.
///
/// Larger `limit` values are not rejected by the API; it silently returns at
/// most this many records. Requests are clamped here so that a short page
/// always means "last page" and never "server truncated the page".
pub const PAGE_SIZE_CEILING: usize = 100;

/// Keys under which a page object may carry its records.
const RECORD_KEYS: [&str; 4] = ["results", "data", "items", "entries"];

/// Keys under which a page object may carry the total record count.
const TOTAL_KEYS: [&str; 3] = ["total", "total_count", "count"];

/// Remote endpoints consumed by the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Topics,
    Feeds,
    AllEntries,
    TopicEntries(String),
    FeedEntries(String),
    UserSubscriptions(String),
}

impl Endpoint {
    fn segments(&self) -> Vec<&str> {
        match self {
            Self::Topics => vec!["api", "v1", "feeds", "topics"],
            Self::Feeds => vec!["api", "v1", "feeds", ""],
            Self::AllEntries => vec!["api", "v1", "feeds", "entries", "list"],
            Self::TopicEntries(id) => vec!["api", "v1", "feeds", "topics", id, "entries"],
            Self::FeedEntries(id) => vec!["api", "v1", "feeds", id, "entries"],
            Self::UserSubscriptions(id) => {
                vec!["api", "v1", "core", "users", id, "topics", "subscriptions"]
            }
        }
    }

    /// Whether the endpoint pages with `limit`/`offset`.
    pub fn is_paged(&self) -> bool {
        matches!(
            self,
            Self::AllEntries | Self::TopicEntries(_) | Self::FeedEntries(_)
        )
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments().join("/"))
    }
}

/// Outcome of a single request attempt.
#[derive(Debug)]
enum RequestError {
    /// Rate limit, server error, connect or timeout failure
    Transient(String),
    Fatal(AppError),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient(message) => f.write_str(message),
            Self::Fatal(err) => write!(f, "{err}"),
        }
    }
}

impl Retryable for RequestError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Client for the feed API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
    retry: RetryPolicy,
    page_size: usize,
}

impl ApiClient {
    /// Build a client from configuration.
    ///
    /// Fails with [`AppError::Authentication`] before any network traffic if
    /// the API key is missing or blank.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                AppError::authentication(
                    "no API key configured; set CARVER_API_KEY or [api] api_key",
                )
            })?;

        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::config(format!(
                "api.base_url '{}' cannot be used as a base URL",
                config.base_url
            )));
        }

        Ok(Self {
            client: http::create_async_client(config, api_key)?,
            base_url,
            retry: RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.initial_retry_delay_ms),
            ),
            page_size: config.page_size,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Configured page size (before clamping).
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Absolute URL for an endpoint.
    pub fn url(&self, endpoint: &Endpoint) -> Result<Url> {
        join_segments(&self.base_url, &endpoint.segments())
            .ok_or_else(|| AppError::config(format!("cannot build URL for {endpoint}")))
    }

    /// Issue one GET with retry and return the decoded JSON body.
    pub async fn fetch(&self, endpoint: &Endpoint, params: &[(&str, String)]) -> Result<Value> {
        let mut url = self.url(endpoint)?;
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        }

        let label = endpoint.to_string();
        self.retry
            .run(&label, |_| self.send_once(endpoint, &url))
            .await
            .map_err(|failure| match failure.error {
                RequestError::Transient(message) => AppError::RetriesExhausted {
                    endpoint: label.clone(),
                    attempts: failure.attempts,
                    message,
                },
                RequestError::Fatal(err) => err,
            })
    }

    async fn send_once(
        &self,
        endpoint: &Endpoint,
        url: &Url,
    ) -> std::result::Result<Value, RequestError> {
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) if e.is_connect() || e.is_timeout() => {
                return Err(RequestError::Transient(e.to_string()));
            }
            Err(e) => return Err(RequestError::Fatal(e.into())),
        };

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(RequestError::Fatal(AppError::authentication(format!(
                "{endpoint} rejected the API key (HTTP {}); check CARVER_API_KEY",
                status.as_u16()
            ))));
        }
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(RequestError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RequestError::Fatal(AppError::Api {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            }));
        }

        let body = match response.text().await {
            Ok(body) => body,
            // Connection dropped or stalled mid-body
            Err(e) if e.is_timeout() || e.is_body() || e.is_decode() => {
                return Err(RequestError::Transient(e.to_string()));
            }
            Err(e) => return Err(RequestError::Fatal(e.into())),
        };
        serde_json::from_str(&body).map_err(|e| RequestError::Fatal(e.into()))
    }

    /// Walk `limit`/`offset` pages until the data runs out.
    ///
    /// `page_size` is clamped to [`PAGE_SIZE_CEILING`]. Paging stops on a
    /// short page, once a reported total is reached, once `max_records`
    /// records have been collected, or when a page brings no record ids that
    /// were not already seen. Records repeated across pages are kept once.
    pub async fn fetch_all(
        &self,
        endpoint: &Endpoint,
        params: &[(&str, String)],
        page_size: usize,
        max_records: Option<usize>,
    ) -> Result<Vec<Value>> {
        let limit = clamp_page_size(page_size);
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = 0usize;

        loop {
            let mut page_params = params.to_vec();
            page_params.push(("limit", limit.to_string()));
            page_params.push(("offset", offset.to_string()));

            let page = self.fetch(endpoint, &page_params).await?;
            let (batch, total) = extract_records(page);
            let received = batch.len();
            let before = records.len();
            records.extend(batch.into_iter().filter(|record| {
                record
                    .get("id")
                    .and_then(Value::as_str)
                    .is_none_or(|id| seen.insert(id.to_string()))
            }));
            let fresh = records.len() - before;
            offset += received;

            log::debug!(
                "{endpoint}: page at offset {} returned {received} records ({} so far)",
                offset - received,
                records.len()
            );

            if let Some(cap) = max_records
                && records.len() >= cap
            {
                records.truncate(cap);
                break;
            }
            if received < limit {
                break;
            }
            if fresh == 0 {
                log::warn!(
                    "{endpoint}: page at offset {} repeated earlier records; stopping",
                    offset - received
                );
                break;
            }
            if total.is_some_and(|total| offset >= total) {
                break;
            }
        }

        log::info!("{endpoint}: fetched {} records", records.len());
        Ok(records)
    }

    /// All topics. The topic list is small and not paged.
    pub async fn list_topics(&self) -> Result<Vec<Topic>> {
        let (records, _) = extract_records(self.fetch(&Endpoint::Topics, &[]).await?);
        Ok(decode_records(records, "topic"))
    }

    /// All feeds, each with its nested parent topic.
    pub async fn list_feeds(&self) -> Result<Vec<Feed>> {
        let (records, _) = extract_records(self.fetch(&Endpoint::Feeds, &[]).await?);
        Ok(decode_records(records, "feed"))
    }

    /// Entries from any paged entry endpoint.
    pub async fn list_entries(
        &self,
        endpoint: &Endpoint,
        page_size: usize,
        max_records: Option<usize>,
    ) -> Result<Vec<Entry>> {
        let records = self
            .fetch_all(endpoint, &[], page_size, max_records)
            .await?;
        Ok(decode_records(records, "entry"))
    }

    /// Topics a user is subscribed to.
    pub async fn user_subscriptions(&self, user_id: &str) -> Result<UserSubscriptions> {
        if user_id.trim().is_empty() {
            return Err(AppError::validation("user id is required"));
        }
        let body = self
            .fetch(&Endpoint::UserSubscriptions(user_id.to_string()), &[])
            .await?;

        if body.is_array() {
            let subscriptions = decode_records(extract_records(body).0, "subscription");
            return Ok(UserSubscriptions {
                total_count: subscriptions.len(),
                subscriptions,
            });
        }
        let mut result: UserSubscriptions = serde_json::from_value(body)?;
        if result.total_count == 0 {
            result.total_count = result.subscriptions.len();
        }
        Ok(result)
    }
}

#[async_trait]
impl FeedSource for ApiClient {
    async fn topics(&self) -> Result<Vec<Topic>> {
        self.list_topics().await
    }

    async fn feeds(&self) -> Result<Vec<Feed>> {
        self.list_feeds().await
    }

    async fn entries(&self, endpoint: &Endpoint, page_size: usize) -> Result<Vec<Entry>> {
        self.list_entries(endpoint, page_size, None).await
    }
}

/// Clamp a requested page size into `1..=PAGE_SIZE_CEILING`.
pub fn clamp_page_size(requested: usize) -> usize {
    let limit = requested.clamp(1, PAGE_SIZE_CEILING);
    if limit != requested {
        log::debug!("page size {requested} clamped to {limit}");
    }
    limit
}

/// Split a page body into its records and optional total count.
///
/// Accepts a bare array or an object with records under one of the
/// envelope keys. Anything else yields no records.
pub fn extract_records(body: Value) -> (Vec<Value>, Option<usize>) {
    match body {
        Value::Array(records) => (records, None),
        Value::Object(mut map) => {
            let total = TOTAL_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_u64))
                .map(|n| n as usize);
            let records = RECORD_KEYS
                .iter()
                .find_map(|key| match map.remove(*key) {
                    Some(Value::Array(records)) => Some(records),
                    _ => None,
                })
                .unwrap_or_default();
            (records, total)
        }
        _ => (Vec::new(), None),
    }
}

/// Decode records, skipping (and logging) any that do not fit the model.
pub(crate) fn decode_records<T: DeserializeOwned>(records: Vec<Value>, kind: &str) -> Vec<T> {
    let total = records.len();
    let decoded: Vec<T> = records
        .into_iter()
        .filter_map(|record| match serde_json::from_value(record) {
            Ok(item) => Some(item),
            Err(e) => {
                log::warn!("Skipping malformed {kind} record: {e}");
                None
            }
        })
        .collect();
    if decoded.len() < total {
        log::warn!("{} of {total} {kind} records skipped", total - decoded.len());
    }
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_paths() {
        assert_eq!(Endpoint::Topics.to_string(), "/api/v1/feeds/topics");
        assert_eq!(Endpoint::Feeds.to_string(), "/api/v1/feeds/");
        assert_eq!(Endpoint::AllEntries.to_string(), "/api/v1/feeds/entries/list");
        assert_eq!(
            Endpoint::TopicEntries("t1".into()).to_string(),
            "/api/v1/feeds/topics/t1/entries"
        );
        assert_eq!(
            Endpoint::FeedEntries("f1".into()).to_string(),
            "/api/v1/feeds/f1/entries"
        );
        assert_eq!(
            Endpoint::UserSubscriptions("u1".into()).to_string(),
            "/api/v1/core/users/u1/topics/subscriptions"
        );
    }

    #[test]
    fn test_clamp_page_size() {
        assert_eq!(clamp_page_size(1000), 100);
        assert_eq!(clamp_page_size(50), 50);
        assert_eq!(clamp_page_size(0), 1);
    }

    #[test]
    fn test_extract_records_envelopes() {
        let (records, total) = extract_records(json!([{"id": "a"}, {"id": "b"}]));
        assert_eq!(records.len(), 2);
        assert_eq!(total, None);

        let (records, total) = extract_records(json!({"items": [{"id": "a"}], "total": 7}));
        assert_eq!(records.len(), 1);
        assert_eq!(total, Some(7));

        let (records, total) = extract_records(json!({"results": [], "count": 0}));
        assert!(records.is_empty());
        assert_eq!(total, Some(0));

        let (records, _) = extract_records(json!({"detail": "nothing here"}));
        assert!(records.is_empty());
    }

    #[test]
    fn test_decode_records_skips_malformed() {
        let topics: Vec<Topic> =
            decode_records(vec![json!({"id": "t1"}), json!({"name": "no id"})], "topic");
        assert_eq!(topics.len(), 1);
    }

    #[test]
    fn test_missing_key_fails_fast() {
        let err = ApiClient::new(&ApiConfig::default()).unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));

        let config = ApiConfig {
            api_key: Some("   ".to_string()),
            ..ApiConfig::default()
        };
        assert!(matches!(
            ApiClient::new(&config).unwrap_err(),
            AppError::Authentication(_)
        ));
    }

    #[test]
    fn test_url_keeps_base_prefix() {
        let config = ApiConfig {
            api_key: Some("k".to_string()),
            base_url: "https://example.com/proxy/".to_string(),
            ..ApiConfig::default()
        };
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(
            client.url(&Endpoint::Topics).unwrap().as_str(),
            "https://example.com/proxy/api/v1/feeds/topics"
        );
    }
}
