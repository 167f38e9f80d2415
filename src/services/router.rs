// src/services/router.rs

//! Picks the narrowest entry endpoint for a filter and backfills linkage.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::{Endpoint, FeedSource};
use crate::error::{AppError, Result};
use crate::models::{Entry, Feed, Topic};

/// Identifies a topic or feed either exactly or by name fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Id(String),
    /// Case-insensitive substring of the name
    Name(String),
}

impl Selector {
    /// Build a selector from optional id and name arguments.
    ///
    /// Exactly one must be given; blank strings count as absent.
    pub fn from_parts(id: Option<&str>, name: Option<&str>) -> Result<Self> {
        let id = id.map(str::trim).filter(|s| !s.is_empty());
        let name = name.map(str::trim).filter(|s| !s.is_empty());
        match (id, name) {
            (Some(id), None) => Ok(Self::Id(id.to_string())),
            (None, Some(name)) => Ok(Self::Name(name.to_string())),
            (Some(_), Some(_)) => Err(AppError::filter(
                "give either an id or a name, not both",
            )),
            (None, None) => Err(AppError::filter("an id or a name is required")),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id '{id}'"),
            Self::Name(name) => write!(f, "name '{name}'"),
        }
    }
}

/// What the caller wants to narrow the entry set to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterIntent {
    Unfiltered,
    Topic(Selector),
    Feed(Selector),
}

/// One planned endpoint call plus the linkage it implies for its entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteCall {
    pub endpoint: Endpoint,
    pub topic_id: Option<String>,
    pub feed_id: Option<String>,
}

/// Catalogs and entries gathered for one intent.
#[derive(Debug, Default)]
pub struct RouterOutput {
    pub topics: Vec<Topic>,
    pub feeds: Vec<Feed>,
    pub entries: Vec<Entry>,
}

/// Turns a [`FilterIntent`] into entry endpoint calls.
pub struct EndpointRouter {
    source: Arc<dyn FeedSource>,
    page_size: usize,
}

impl EndpointRouter {
    pub fn new(source: Arc<dyn FeedSource>, page_size: usize) -> Self {
        Self { source, page_size }
    }

    pub fn source(&self) -> Arc<dyn FeedSource> {
        Arc::clone(&self.source)
    }

    /// Plan the endpoint calls for an intent.
    ///
    /// A name matching several topics (or feeds) yields one call per match.
    /// A name or id matching nothing yields an empty plan.
    pub fn resolve(intent: &FilterIntent, topics: &[Topic], feeds: &[Feed]) -> Vec<RouteCall> {
        let calls: Vec<RouteCall> = match intent {
            FilterIntent::Unfiltered => vec![RouteCall {
                endpoint: Endpoint::AllEntries,
                topic_id: None,
                feed_id: None,
            }],
            FilterIntent::Topic(selector) => topics
                .iter()
                .filter(|t| match selector {
                    Selector::Id(id) => &t.id == id,
                    Selector::Name(name) => t.name_matches(name),
                })
                .map(|t| RouteCall {
                    endpoint: Endpoint::TopicEntries(t.id.clone()),
                    topic_id: Some(t.id.clone()),
                    feed_id: None,
                })
                .collect(),
            FilterIntent::Feed(selector) => feeds
                .iter()
                .filter(|f| match selector {
                    Selector::Id(id) => &f.id == id,
                    Selector::Name(name) => f.name_matches(name),
                })
                .map(|f| RouteCall {
                    endpoint: Endpoint::FeedEntries(f.id.clone()),
                    topic_id: f.parent_topic_id().map(str::to_string),
                    feed_id: Some(f.id.clone()),
                })
                .collect(),
        };

        match intent {
            FilterIntent::Topic(selector) if calls.is_empty() => {
                log::warn!("No topic matches {selector}; returning no entries");
            }
            FilterIntent::Feed(selector) if calls.is_empty() => {
                log::warn!("No feed matches {selector}; returning no entries");
            }
            FilterIntent::Topic(selector) | FilterIntent::Feed(selector) if calls.len() > 1 => {
                log::info!("{selector} matched {} candidates; fetching all", calls.len());
            }
            _ => {}
        }
        calls
    }

    /// Load both catalogs, then the entries the intent resolves to.
    ///
    /// Entries come back with `topic_id`/`feed_id` filled from the call that
    /// produced them, or from the feed catalog when only the feed is known.
    pub async fn fetch(&self, intent: &FilterIntent) -> Result<RouterOutput> {
        let topics = self.source.topics().await?;
        let feeds = self.source.feeds().await?;
        log::info!("Catalog loaded: {} topics, {} feeds", topics.len(), feeds.len());

        let plan = Self::resolve(intent, &topics, &feeds);
        let feed_topics: HashMap<String, String> = feeds
            .iter()
            .filter_map(|f| Some((f.id.clone(), f.parent_topic_id()?.to_string())))
            .collect();

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for call in &plan {
            let batch = self.source.entries(&call.endpoint, self.page_size).await?;
            log::debug!("{}: {} entries", call.endpoint, batch.len());

            for mut entry in batch {
                if !seen.insert(entry.id.clone()) {
                    continue;
                }
                entry.backfill(call.topic_id.as_deref(), call.feed_id.as_deref());
                if entry.parent_topic_id().is_none()
                    && let Some(topic_id) = entry.parent_feed_id().and_then(|f| feed_topics.get(f))
                {
                    entry.topic_id = Some(topic_id.clone());
                }
                entries.push(entry);
            }
        }

        Ok(RouterOutput {
            topics,
            feeds,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(id: &str, name: &str) -> Topic {
        serde_json::from_value(serde_json::json!({"id": id, "name": name})).unwrap()
    }

    fn feed(id: &str, name: &str, topic_id: &str) -> Feed {
        serde_json::from_value(serde_json::json!({
            "id": id, "name": name, "topic": {"id": topic_id}
        }))
        .unwrap()
    }

    #[test]
    fn test_selector_from_parts() {
        assert_eq!(
            Selector::from_parts(Some("t1"), None).unwrap(),
            Selector::Id("t1".into())
        );
        assert_eq!(
            Selector::from_parts(Some(" "), Some("Bank")).unwrap(),
            Selector::Name("Bank".into())
        );
        assert!(Selector::from_parts(Some("t1"), Some("Bank")).is_err());
        assert!(Selector::from_parts(None, Some("")).is_err());
    }

    #[test]
    fn test_resolve_unfiltered_uses_broad_endpoint() {
        let calls = EndpointRouter::resolve(&FilterIntent::Unfiltered, &[], &[]);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].endpoint, Endpoint::AllEntries);
    }

    #[test]
    fn test_resolve_topic_name_keeps_every_match() {
        let topics = vec![
            topic("t1", "Banking Regulation"),
            topic("t2", "Investment Banking"),
            topic("t3", "Healthcare"),
        ];
        let calls = EndpointRouter::resolve(
            &FilterIntent::Topic(Selector::Name("banking".into())),
            &topics,
            &[],
        );
        let endpoints: Vec<_> = calls.iter().map(|c| c.endpoint.clone()).collect();
        assert_eq!(
            endpoints,
            vec![
                Endpoint::TopicEntries("t1".into()),
                Endpoint::TopicEntries("t2".into())
            ]
        );
        assert_eq!(calls[1].topic_id.as_deref(), Some("t2"));
    }

    #[test]
    fn test_resolve_no_match_is_empty() {
        let topics = vec![topic("t1", "Banking")];
        assert!(
            EndpointRouter::resolve(
                &FilterIntent::Topic(Selector::Name("Energy".into())),
                &topics,
                &[]
            )
            .is_empty()
        );
        assert!(
            EndpointRouter::resolve(
                &FilterIntent::Topic(Selector::Id("t9".into())),
                &topics,
                &[]
            )
            .is_empty()
        );
    }

    #[test]
    fn test_resolve_feed_carries_parent_topic() {
        let feeds = vec![feed("f1", "SEC Press Releases", "t1")];
        let calls = EndpointRouter::resolve(
            &FilterIntent::Feed(Selector::Id("f1".into())),
            &[],
            &feeds,
        );
        assert_eq!(
            calls,
            vec![RouteCall {
                endpoint: Endpoint::FeedEntries("f1".into()),
                topic_id: Some("t1".into()),
                feed_id: Some("f1".into()),
            }]
        );
    }
}
