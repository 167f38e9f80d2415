//! Object storage for externally stored entry content.
//!
//! Entries reference their full bodies by `s3://bucket/key` paths. This
//! module validates those paths, reads objects through the [`ObjectStore`]
//! trait, and resolves batches of paths concurrently with
//! [`ContentFetcher`].

mod fetcher;
mod path;
#[cfg(feature = "s3")]
pub mod s3;

use async_trait::async_trait;
use thiserror::Error;

use crate::services::Retryable;

pub use fetcher::{ContentFetcher, DEFAULT_MAX_CONTENT_BYTES, DEFAULT_MAX_WORKERS, worker_count};
pub use path::{ContentPath, MAX_PATH_LEN};
#[cfg(feature = "s3")]
pub use s3::S3ObjectStore;

/// Why a single object could not be read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("object not found")]
    NotFound,

    #[error("access denied")]
    AccessDenied,

    #[error("object exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("timed out")]
    Timeout,

    /// Throttling, 5xx or dropped connection
    #[error("transient storage error: {0}")]
    Transient(String),

    #[error("storage error: {0}")]
    Permanent(String),

    #[error("content is not valid UTF-8")]
    Decode,
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Transient(_))
    }
}

/// Read access to an object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read a whole object, failing with [`FetchError::TooLarge`] rather
    /// than returning more than `max_bytes`.
    async fn get_object(
        &self,
        path: &ContentPath,
        max_bytes: u64,
    ) -> std::result::Result<Vec<u8>, FetchError>;
}
