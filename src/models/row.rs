//! The flattened topic/feed/entry row the query pipeline operates on.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContentStatus, EntryMetadata};
use crate::error::AppError;

/// One denormalized row: a topic joined with (optionally) a feed and an entry.
///
/// `topic_id` and `topic_name` are never empty for rows produced by
/// [`crate::pipeline::view::build`]; a topic without a name is shown by its id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HierarchyRow {
    pub topic_id: String,
    pub topic_name: String,
    pub topic_description: Option<String>,
    pub topic_is_active: bool,
    pub topic_created_at: Option<DateTime<Utc>>,
    pub topic_updated_at: Option<DateTime<Utc>>,

    pub feed_id: Option<String>,
    pub feed_name: Option<String>,
    pub feed_url: Option<String>,
    pub feed_is_active: Option<bool>,

    pub entry_id: Option<String>,
    pub entry_title: Option<String>,
    pub entry_link: Option<String>,
    pub entry_description: Option<String>,
    pub entry_content_markdown: Option<String>,
    pub entry_content_html: Option<String>,
    pub entry_published_at: Option<DateTime<Utc>>,
    pub entry_created_at: Option<DateTime<Utc>>,
    pub entry_is_active: Option<bool>,
    pub entry_content_status: Option<ContentStatus>,
    pub entry_content_timestamp: Option<DateTime<Utc>>,

    pub entry_md_path: Option<String>,
    pub entry_html_path: Option<String>,
    pub entry_aggregated_md_path: Option<String>,

    /// The untouched nested metadata object
    pub entry_metadata: Option<EntryMetadata>,
}

/// Text columns that can be matched by substring and keyword filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Description,
    Link,
    ContentMarkdown,
    ContentHtml,
    TopicName,
    FeedName,
}

impl Field {
    /// Fields searched when a keyword search names none.
    pub const DEFAULT_SEARCH: [Field; 3] =
        [Field::Title, Field::Description, Field::ContentMarkdown];

    /// The column this field reads from a row.
    pub fn value<'a>(&self, row: &'a HierarchyRow) -> Option<&'a str> {
        match self {
            Self::Title => row.entry_title.as_deref(),
            Self::Description => row.entry_description.as_deref(),
            Self::Link => row.entry_link.as_deref(),
            Self::ContentMarkdown => row.entry_content_markdown.as_deref(),
            Self::ContentHtml => row.entry_content_html.as_deref(),
            Self::TopicName => Some(row.topic_name.as_str()),
            Self::FeedName => row.feed_name.as_deref(),
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            Self::Title => "entry_title",
            Self::Description => "entry_description",
            Self::Link => "entry_link",
            Self::ContentMarkdown => "entry_content_markdown",
            Self::ContentHtml => "entry_content_html",
            Self::TopicName => "topic_name",
            Self::FeedName => "feed_name",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Field {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let field = match name.strip_prefix("entry_").unwrap_or(&name) {
            "title" => Self::Title,
            "description" => Self::Description,
            "link" => Self::Link,
            "content_markdown" => Self::ContentMarkdown,
            "content_html" => Self::ContentHtml,
            "topic_name" => Self::TopicName,
            "feed_name" => Self::FeedName,
            _ => return Err(AppError::filter(format!("unknown field '{s}'"))),
        };
        Ok(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names() {
        assert_eq!("title".parse::<Field>().unwrap(), Field::Title);
        assert_eq!("entry_title".parse::<Field>().unwrap(), Field::Title);
        assert_eq!("Content_Markdown".parse::<Field>().unwrap(), Field::ContentMarkdown);
        assert_eq!("topic_name".parse::<Field>().unwrap(), Field::TopicName);
        assert!("entry_topic_name".parse::<Field>().is_ok());
        assert!("published_at".parse::<Field>().is_err());
    }

    #[test]
    fn test_display_is_column_name() {
        assert_eq!(Field::Description.to_string(), "entry_description");
    }
}
