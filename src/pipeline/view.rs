// src/pipeline/view.rs

//! Flattens topics, feeds and entries into [`HierarchyRow`]s.

use std::collections::HashMap;

use crate::models::{Entry, Feed, HierarchyRow, Topic};

/// Build the denormalized view.
///
/// With `include_entries`, one row per entry whose topic can be resolved;
/// entries without a resolvable topic are dropped. Without it, one row per
/// (topic, feed) pair; topics without feeds produce no rows.
pub fn build(
    topics: &[Topic],
    feeds: &[Feed],
    entries: &[Entry],
    include_entries: bool,
) -> Vec<HierarchyRow> {
    let topic_index: HashMap<&str, &Topic> = topics.iter().map(|t| (t.id.as_str(), t)).collect();
    let feed_index: HashMap<&str, &Feed> = feeds.iter().map(|f| (f.id.as_str(), f)).collect();

    if !include_entries {
        let rows: Vec<HierarchyRow> = feeds
            .iter()
            .filter_map(|feed| {
                let topic = topic_index.get(feed.parent_topic_id()?)?;
                Some(feed_row(topic, feed))
            })
            .collect();
        log::info!("Built hierarchy with {} topic/feed rows", rows.len());
        return rows;
    }

    let mut gaps = MissingFields::default();
    let mut orphans = 0usize;
    let mut rows = Vec::with_capacity(entries.len());

    for entry in entries {
        let Some(topic) = entry
            .parent_topic_id()
            .and_then(|id| topic_index.get(id))
        else {
            orphans += 1;
            continue;
        };
        let feed = entry.parent_feed_id().and_then(|id| feed_index.get(id).copied());
        gaps.record(entry, feed.is_some());
        rows.push(entry_row(topic, feed, entry));
    }

    if orphans > 0 {
        log::warn!("Dropped {orphans} entries with no resolvable topic");
    }
    gaps.report();
    log::info!("Built hierarchy with {} entry rows", rows.len());
    rows
}

fn topic_columns(topic: &Topic) -> HierarchyRow {
    // Unnamed topics show their id
    let name = match topic.name.trim() {
        "" => topic.id.clone(),
        _ => topic.name.clone(),
    };
    HierarchyRow {
        topic_id: topic.id.clone(),
        topic_name: name,
        topic_description: topic.description.clone(),
        topic_is_active: topic.is_active,
        topic_created_at: topic.created_at,
        topic_updated_at: topic.updated_at,
        feed_id: None,
        feed_name: None,
        feed_url: None,
        feed_is_active: None,
        entry_id: None,
        entry_title: None,
        entry_link: None,
        entry_description: None,
        entry_content_markdown: None,
        entry_content_html: None,
        entry_published_at: None,
        entry_created_at: None,
        entry_is_active: None,
        entry_content_status: None,
        entry_content_timestamp: None,
        entry_md_path: None,
        entry_html_path: None,
        entry_aggregated_md_path: None,
        entry_metadata: None,
    }
}

fn feed_row(topic: &Topic, feed: &Feed) -> HierarchyRow {
    let mut row = topic_columns(topic);
    set_feed(&mut row, feed);
    row
}

fn set_feed(row: &mut HierarchyRow, feed: &Feed) {
    row.feed_id = Some(feed.id.clone());
    row.feed_name = Some(feed.name.clone());
    row.feed_url = feed.url.clone();
    row.feed_is_active = Some(feed.is_active);
}

fn entry_row(topic: &Topic, feed: Option<&Feed>, entry: &Entry) -> HierarchyRow {
    let mut row = topic_columns(topic);
    match feed {
        Some(feed) => set_feed(&mut row, feed),
        None => row.feed_id = entry.parent_feed_id().map(str::to_string),
    }

    let meta = entry.extracted_metadata.as_ref();
    row.entry_id = Some(entry.id.clone());
    row.entry_title = entry.title.clone();
    row.entry_link = entry.link.clone();
    row.entry_description = entry.description.clone();
    row.entry_content_markdown = entry.content_markdown.clone();
    row.entry_published_at = entry.published();
    row.entry_created_at = entry.created_at;
    row.entry_is_active = Some(entry.is_active.unwrap_or(true));
    row.entry_content_status = meta.and_then(|m| m.content_status);
    row.entry_content_timestamp = meta.and_then(|m| m.timestamp);
    row.entry_md_path = meta.and_then(|m| m.s3_content_md_path.clone());
    row.entry_html_path = meta.and_then(|m| m.s3_content_html_path.clone());
    row.entry_aggregated_md_path = meta.and_then(|m| m.s3_aggregated_content_md_path.clone());
    row.entry_metadata = entry.extracted_metadata.clone();
    row
}

/// Counts of optional entry fields that were absent.
#[derive(Debug, Default)]
struct MissingFields {
    published_at: usize,
    is_active: usize,
    metadata: usize,
    feed: usize,
}

impl MissingFields {
    fn record(&mut self, entry: &Entry, has_feed: bool) {
        self.published_at += usize::from(entry.published().is_none());
        self.is_active += usize::from(entry.is_active.is_none());
        self.metadata += usize::from(entry.extracted_metadata.is_none());
        self.feed += usize::from(!has_feed);
    }

    // Optional fields are legitimately absent; keep this at debug.
    fn report(&self) {
        for (field, count) in [
            ("published_at", self.published_at),
            ("is_active", self.is_active),
            ("extracted_metadata", self.metadata),
            ("feed", self.feed),
        ] {
            if count > 0 {
                log::debug!("{count} entries have no {field}; filled with null");
            }
        }
    }
}
