//! Entry records and their nested metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;

/// Processing state of an entry's externally stored content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Other,
}

/// Which stored body of an entry to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentKind {
    #[default]
    Markdown,
    Html,
    AggregatedMarkdown,
}

/// The `extracted_metadata` object attached to entries.
///
/// Known keys are promoted to named fields; anything else is kept in
/// `extended` so newer API fields survive a round trip.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EntryMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_status: Option<ContentStatus>,

    #[serde(
        default,
        deserialize_with = "timestamp::lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_content_md_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_content_html_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_aggregated_content_md_path: Option<String>,

    #[serde(flatten)]
    pub extended: serde_json::Map<String, serde_json::Value>,
}

impl EntryMetadata {
    /// Path reference for the requested content kind.
    pub fn content_path(&self, kind: ContentKind) -> Option<&str> {
        match kind {
            ContentKind::Markdown => self.s3_content_md_path.as_deref(),
            ContentKind::Html => self.s3_content_html_path.as_deref(),
            ContentKind::AggregatedMarkdown => self.s3_aggregated_content_md_path.as_deref(),
        }
        .filter(|p| !p.trim().is_empty())
    }
}

/// An entry as returned by any of the entry endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    pub id: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub link: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub content_markdown: Option<String>,

    #[serde(default, deserialize_with = "timestamp::lenient")]
    pub published_at: Option<DateTime<Utc>>,

    /// Older payloads name the publication time `published_date`
    #[serde(default, deserialize_with = "timestamp::lenient")]
    pub published_date: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "timestamp::lenient")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub is_active: Option<bool>,

    #[serde(default)]
    pub feed_id: Option<String>,

    #[serde(default)]
    pub topic_id: Option<String>,

    #[serde(default)]
    pub extracted_metadata: Option<EntryMetadata>,
}

impl Entry {
    /// Publication time, falling back to `published_date`.
    pub fn published(&self) -> Option<DateTime<Utc>> {
        self.published_at.or(self.published_date)
    }

    /// Parent topic id from the top level or the nested metadata.
    pub fn parent_topic_id(&self) -> Option<&str> {
        self.topic_id.as_deref().or_else(|| {
            self.extracted_metadata
                .as_ref()
                .and_then(|m| m.topic_id.as_deref())
        })
    }

    /// Parent feed id from the top level or the nested metadata.
    pub fn parent_feed_id(&self) -> Option<&str> {
        self.feed_id.as_deref().or_else(|| {
            self.extracted_metadata
                .as_ref()
                .and_then(|m| m.feed_id.as_deref())
        })
    }

    /// Fill in linkage the endpoint left out. Existing values win.
    pub fn backfill(&mut self, topic_id: Option<&str>, feed_id: Option<&str>) {
        if self.parent_topic_id().is_none() {
            self.topic_id = topic_id.map(str::to_string);
        }
        if self.parent_feed_id().is_none() {
            self.feed_id = feed_id.map(str::to_string);
        }
    }
}
