// src/models/mod.rs

//! Domain models for the feed client.
//!
//! Remote records (topics, feeds, entries), the flattened row shape used by
//! the query pipeline, and application configuration.

mod config;
mod entry;
mod row;
pub mod timestamp;
mod topic;

// Re-export all public types
pub use config::{
    ApiConfig, Config, LoggingConfig, MAX_WORKERS_LIMIT, QueryConfig, StorageConfig,
};
pub use entry::{ContentKind, ContentStatus, Entry, EntryMetadata};
pub use row::{Field, HierarchyRow};
pub use topic::{Feed, Subscription, Topic, TopicRef, UserSubscriptions};
