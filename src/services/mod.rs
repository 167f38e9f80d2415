//! Service layer for the feed client.
//!
//! This module contains:
//! - The resilient, paginating API client (`ApiClient`)
//! - The endpoint router that picks the narrowest query (`EndpointRouter`)
//! - The shared retry/backoff policy (`RetryPolicy`)

mod api;
pub mod retry;
mod router;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Entry, Feed, Topic};

pub use api::{ApiClient, Endpoint, PAGE_SIZE_CEILING, clamp_page_size, extract_records};
pub use retry::{RetryPolicy, Retryable};
pub use router::{EndpointRouter, FilterIntent, RouteCall, RouterOutput, Selector};

/// Read access to topic, feed and entry listings.
///
/// Implemented by [`ApiClient`]; tests substitute in-memory sources.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn topics(&self) -> Result<Vec<Topic>>;

    async fn feeds(&self) -> Result<Vec<Feed>>;

    /// Every entry behind a paged entry endpoint.
    async fn entries(&self, endpoint: &Endpoint, page_size: usize) -> Result<Vec<Entry>>;
}
