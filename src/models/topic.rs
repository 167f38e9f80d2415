//! Topic, feed and subscription records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;

/// A top-level regulatory grouping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Topic {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Missing values are treated as active
    #[serde(default = "default_active")]
    pub is_active: bool,

    #[serde(default, deserialize_with = "timestamp::lenient")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "timestamp::lenient")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Topic {
    /// Case-insensitive substring match on the topic name.
    pub fn name_matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(&needle.to_lowercase())
    }
}

/// `{id, name}` reference nested inside feed payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A source feed belonging to a topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feed {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub topic: Option<TopicRef>,

    /// Flat form used by some endpoints instead of the nested `topic`
    #[serde(default)]
    pub topic_id: Option<String>,

    #[serde(default = "default_active")]
    pub is_active: bool,

    #[serde(default, deserialize_with = "timestamp::lenient")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Feed {
    /// Parent topic id from either the nested or the flat form.
    pub fn parent_topic_id(&self) -> Option<&str> {
        self.topic
            .as_ref()
            .map(|t| t.id.as_str())
            .or(self.topic_id.as_deref())
    }

    /// Case-insensitive substring match on the feed name.
    pub fn name_matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(&needle.to_lowercase())
    }
}

/// A topic a user is subscribed to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub base_domain: Option<String>,
}

/// Response of the per-user subscriptions endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserSubscriptions {
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
    #[serde(default)]
    pub total_count: usize,
}

fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_defaults() {
        let topic: Topic = serde_json::from_str(r#"{"id": "t1"}"#).unwrap();
        assert_eq!(topic.name, "");
        assert!(topic.is_active);
        assert!(topic.created_at.is_none());
    }

    #[test]
    fn test_feed_parent_topic_nested_and_flat() {
        let nested: Feed = serde_json::from_str(
            r#"{"id": "f1", "name": "News", "topic": {"id": "t1", "name": "Banking"}}"#,
        )
        .unwrap();
        assert_eq!(nested.parent_topic_id(), Some("t1"));

        let flat: Feed = serde_json::from_str(r#"{"id": "f2", "topic_id": "t2"}"#).unwrap();
        assert_eq!(flat.parent_topic_id(), Some("t2"));
    }

    #[test]
    fn test_name_matches_ignores_case() {
        let topic: Topic =
            serde_json::from_str(r#"{"id": "t1", "name": "Banking Regulation"}"#).unwrap();
        assert!(topic.name_matches("banking"));
        assert!(topic.name_matches("REGULATION"));
        assert!(!topic.name_matches("health"));
    }
}
