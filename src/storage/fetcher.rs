// src/storage/fetcher.rs

//! Bounded-concurrency resolution of content paths into text.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use super::{ContentPath, FetchError, ObjectStore};
use crate::error::{AppError, Result};
use crate::models::{Config, MAX_WORKERS_LIMIT};
use crate::services::RetryPolicy;

pub const DEFAULT_MAX_WORKERS: usize = 10;

pub const DEFAULT_MAX_CONTENT_BYTES: u64 = 10 * 1024 * 1024;

const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(70);

/// Resolves batches of `s3://` paths into text.
///
/// Without a store the fetcher is degraded: every path resolves to `None`
/// and each batch logs a single warning.
#[derive(Clone)]
pub struct ContentFetcher {
    store: Option<Arc<dyn ObjectStore>>,
    retry: RetryPolicy,
    max_bytes: u64,
    item_timeout: Duration,
}

impl ContentFetcher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store: Some(store),
            retry: RetryPolicy::default(),
            max_bytes: DEFAULT_MAX_CONTENT_BYTES,
            item_timeout: DEFAULT_ITEM_TIMEOUT,
        }
    }

    /// A fetcher with no store behind it.
    pub fn disabled() -> Self {
        Self {
            store: None,
            retry: RetryPolicy::default(),
            max_bytes: DEFAULT_MAX_CONTENT_BYTES,
            item_timeout: DEFAULT_ITEM_TIMEOUT,
        }
    }

    /// Connect to the configured object store.
    ///
    /// Missing credentials are not an error: the fetcher comes back disabled.
    pub async fn from_config(config: &Config) -> Result<Self> {
        #[cfg(feature = "s3")]
        let fetcher = match super::S3ObjectStore::connect(&config.storage).await? {
            Some(store) => Self::new(Arc::new(store)),
            None => Self::disabled(),
        };
        #[cfg(not(feature = "s3"))]
        let fetcher = {
            log::debug!("Built without the s3 feature; content fetching is disabled");
            Self::disabled()
        };

        let storage = &config.storage;
        Ok(fetcher
            .with_retry(RetryPolicy::new(
                config.api.max_retries,
                Duration::from_millis(config.api.initial_retry_delay_ms),
            ))
            .with_max_bytes(storage.max_content_bytes)
            .with_item_timeout(Duration::from_secs(
                storage.connect_timeout_secs + storage.read_timeout_secs,
            )))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Deadline for one attempt at one object.
    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = timeout;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Resolve every path, at most `max_workers` at a time.
    ///
    /// The returned map has exactly one key per distinct input path. Paths
    /// that are malformed or could not be fetched map to `None`. The only
    /// error is an out-of-range worker count, raised before any fetch.
    pub async fn fetch_batch<I, S>(
        &self,
        paths: I,
        max_workers: usize,
    ) -> Result<HashMap<String, Option<String>>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let workers = worker_count(max_workers)?;

        let mut seen = HashSet::new();
        let unique: Vec<String> = paths
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .filter(|p| seen.insert(p.clone()))
            .collect();

        let Some(store) = self.store.as_deref() else {
            if !unique.is_empty() {
                log::warn!(
                    "No object-store credentials available; {} content paths left unresolved",
                    unique.len()
                );
            }
            return Ok(unique.into_iter().map(|p| (p, None)).collect());
        };

        let requested = unique.len();
        let results: Vec<(String, Option<String>)> = stream::iter(unique)
            .map(|raw| async move {
                let body = self.fetch_one(store, &raw).await;
                (raw, body)
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        let resolved = results.iter().filter(|(_, body)| body.is_some()).count();
        log::info!("Resolved {resolved}/{requested} content paths");
        Ok(results.into_iter().collect())
    }

    async fn fetch_one(&self, store: &dyn ObjectStore, raw: &str) -> Option<String> {
        let path = match ContentPath::parse(raw) {
            Ok(path) => path,
            Err(e) => {
                log::warn!("Skipping content: {e}");
                return None;
            }
        };

        let path = &path;
        let (max_bytes, timeout) = (self.max_bytes, self.item_timeout);
        let result = self
            .retry
            .run(raw, |_| async move {
                tokio::time::timeout(timeout, store.get_object(path, max_bytes))
                    .await
                    .unwrap_or(Err(FetchError::Timeout))
            })
            .await;

        match result {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => Some(text),
                Err(_) => {
                    log::warn!("Failed to fetch {raw}: {}", FetchError::Decode);
                    None
                }
            },
            Err(failure) => {
                log::warn!(
                    "Failed to fetch {raw} after {} attempt(s): {}",
                    failure.attempts,
                    failure.error
                );
                None
            }
        }
    }
}

/// Validate a worker count: zero is an error, anything above the limit is
/// clamped.
pub fn worker_count(requested: usize) -> Result<usize> {
    if requested == 0 {
        return Err(AppError::validation("max_workers must be at least 1"));
    }
    if requested > MAX_WORKERS_LIMIT {
        log::debug!("max_workers {requested} clamped to {MAX_WORKERS_LIMIT}");
        return Ok(MAX_WORKERS_LIMIT);
    }
    Ok(requested)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count_bounds() {
        assert!(worker_count(0).is_err());
        assert_eq!(worker_count(1).unwrap(), 1);
        assert_eq!(worker_count(50).unwrap(), 50);
        assert_eq!(worker_count(500).unwrap(), 50);
    }

    #[tokio::test]
    async fn test_disabled_fetcher_returns_every_key() {
        let fetcher = ContentFetcher::disabled();
        let result = fetcher
            .fetch_batch(["s3://bucket/a.md", "s3://bucket/b.md", "s3://bucket/a.md"], 10)
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.values().all(Option::is_none));
    }

    #[tokio::test]
    async fn test_zero_workers_is_rejected_even_when_disabled() {
        let err = ContentFetcher::disabled()
            .fetch_batch(["s3://bucket/a.md"], 0)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
