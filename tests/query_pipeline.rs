mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use common::{FakeSource, FakeStore, entry, feed, topic};
use regfeeds::AppError;
use regfeeds::models::{ContentKind, Field};
use regfeeds::pipeline::{QueryPipeline, Search};
use regfeeds::services::{Endpoint, RetryPolicy, Selector};
use regfeeds::storage::ContentFetcher;
use serde_json::json;

/// Banking has three feeds with 10, 5 and 8 entries, two of them inactive.
/// Healthcare has one feed with 3 entries.
fn banking() -> FakeSource {
    let mut banking_entries = Vec::new();
    let mut by_feed = Vec::new();
    for (feed_id, count) in [("f1", 10), ("f2", 5), ("f3", 8)] {
        let start = banking_entries.len();
        for i in 0..count {
            let id = format!("{feed_id}-e{i}");
            let description = if i == 0 {
                "Capital requirements update"
            } else {
                "Routine filing"
            };
            let active = !(feed_id == "f2" && i < 2);
            banking_entries.push(entry(json!({
                "id": id,
                "title": format!("{feed_id} notice {i}"),
                "description": description,
                "published_at": format!("2024-01-{:02}T12:00:00Z", i + 1),
                "feed_id": feed_id,
                "is_active": active,
                "extracted_metadata": {
                    "s3_content_md_path": format!("s3://content-bucket/{feed_id}/{i}.md")
                }
            })));
        }
        by_feed.push((feed_id, banking_entries[start..].to_vec()));
    }
    let health_entries = (0..3)
        .map(|i| {
            entry(json!({
                "id": format!("f4-e{i}"),
                "title": format!("Drug safety alert {i}"),
                "feed_id": "f4"
            }))
        })
        .collect();

    let mut source = FakeSource {
        topics: vec![topic("t1", "Banking Regulation"), topic("t2", "Healthcare")],
        feeds: vec![
            feed("f1", "SEC Press Releases", "t1"),
            feed("f2", "FDIC Notices", "t1"),
            feed("f3", "OCC Bulletins", "t1"),
            feed("f4", "FDA Alerts", "t2"),
        ],
        ..FakeSource::default()
    }
    .with_entries(Endpoint::TopicEntries("t1".into()), banking_entries)
    .with_entries(Endpoint::TopicEntries("t2".into()), health_entries);
    for (feed_id, entries) in by_feed {
        source = source.with_entries(Endpoint::FeedEntries(feed_id.into()), entries);
    }
    source
}

fn pipeline(source: &Arc<FakeSource>) -> QueryPipeline {
    QueryPipeline::new(source.clone())
}

#[tokio::test]
async fn topic_then_active_filter() {
    let source = Arc::new(banking());
    let mut query = pipeline(&source);

    query
        .filter_by_topic(Selector::Name("banking".into()))
        .await
        .unwrap();
    assert_eq!(query.len(), 23);
    assert_eq!(source.calls(), vec![Endpoint::TopicEntries("t1".into())]);

    query.filter_by_active(true).await.unwrap();
    let rows = query.to_rows().unwrap();
    assert_eq!(rows.len(), 21);
    assert!(rows.iter().all(|r| r.topic_name == "Banking Regulation"));
    assert!(rows.iter().all(|r| r.feed_name.is_some()));
}

#[tokio::test]
async fn feed_filter_loads_through_topic_cache() {
    let source = Arc::new(banking());
    let mut query = pipeline(&source);

    query
        .filter_by_topic(Selector::Id("t1".into()))
        .await
        .unwrap()
        .filter_by_feed(Selector::Name("fdic".into()))
        .await
        .unwrap();
    assert_eq!(query.len(), 5);
    assert_eq!(source.calls().len(), 1);
}

#[tokio::test]
async fn reset_reloads_the_same_rows() {
    let source = Arc::new(banking());
    let mut query = pipeline(&source);

    query
        .filter_by_topic(Selector::Id("t1".into()))
        .await
        .unwrap();
    let first = query.to_rows().unwrap();
    let version = query.version();

    query.reset();
    assert!(!query.is_loaded());
    assert!(query.version() > version);

    query
        .filter_by_topic(Selector::Id("t1".into()))
        .await
        .unwrap();
    assert_eq!(query.to_rows().unwrap(), first);
    assert_eq!(source.calls().len(), 2);
}

#[tokio::test]
async fn search_without_narrowing_needs_full_scan_opt_in() {
    let source = Arc::new(banking());
    let mut query = pipeline(&source);

    let err = query.search(&Search::new(["capital"])).await.unwrap_err();
    assert!(matches!(err, AppError::Filter(_)));
    assert!(source.calls().is_empty());
    assert!(query.to_json(false).is_err());

    let mut query = pipeline(&source).allow_full_scan(true);
    query.search(&Search::new(["capital"])).await.unwrap();
    assert_eq!(source.calls(), vec![Endpoint::AllEntries]);
    assert_eq!(query.len(), 3);
}

#[tokio::test]
async fn search_any_and_all_keywords() {
    let source = Arc::new(banking());
    let mut query = pipeline(&source);
    query
        .filter_by_topic(Selector::Id("t1".into()))
        .await
        .unwrap();

    query
        .search(&Search::new(["CAPITAL", "f2 notice 4"]))
        .await
        .unwrap();
    assert_eq!(query.len(), 4);

    query
        .search(&Search::new(["capital", "f1"]).match_all(true))
        .await
        .unwrap();
    let rows = query.to_rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].entry_id.as_deref(), Some("f1-e0"));
}

#[tokio::test]
async fn field_filter_rejects_empty_text() {
    let source = Arc::new(banking());
    let mut query = pipeline(&source);
    query
        .filter_by_topic(Selector::Id("t1".into()))
        .await
        .unwrap();

    assert!(matches!(
        query.filter_by_field(Field::Title, "", false).await,
        Err(AppError::Filter(_))
    ));
    query
        .filter_by_field(Field::FeedName, "OCC", true)
        .await
        .unwrap();
    assert_eq!(query.len(), 8);
}

#[tokio::test]
async fn date_range_is_inclusive() {
    let source = Arc::new(banking());
    let mut query = pipeline(&source);
    query
        .filter_by_topic(Selector::Id("t1".into()))
        .await
        .unwrap();

    let start = Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();
    query.filter_by_date(Some(start), Some(end)).await.unwrap();
    assert_eq!(query.len(), 6);

    assert!(matches!(
        query.filter_by_date(Some(end), Some(start)).await,
        Err(AppError::Filter(_))
    ));
    assert!(matches!(
        query.filter_by_date(None, None).await,
        Err(AppError::Filter(_))
    ));
}

#[tokio::test]
async fn rows_without_publication_time_never_match_dates() {
    let source = Arc::new(banking());
    let mut query = pipeline(&source);
    query
        .filter_by_topic(Selector::Name("health".into()))
        .await
        .unwrap();
    assert_eq!(query.len(), 3);

    let start = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
    query.filter_by_date(Some(start), None).await.unwrap();
    assert!(query.is_empty());
}

#[tokio::test]
async fn version_only_moves_on_change() {
    let source = Arc::new(banking());
    let mut query = pipeline(&source);
    assert_eq!(query.version(), 0);

    query
        .filter_by_topic(Selector::Id("t1".into()))
        .await
        .unwrap();
    let loaded = query.version();
    assert!(loaded > 0);

    query.filter_by_field(Field::TopicName, "banking", false).await.unwrap();
    assert_eq!(query.version(), loaded);

    query.filter_by_active(false).await.unwrap();
    assert!(query.version() > loaded);
}

#[tokio::test]
async fn fetch_content_fills_markdown_for_remaining_rows() {
    let source = Arc::new(banking());
    let store = FakeStore::default()
        .with_object("s3://content-bucket/f2/0.md", "# Inactive notice")
        .with_object("s3://content-bucket/f2/2.md", "# Active notice");
    let store = Arc::new(store);
    let fetcher = ContentFetcher::new(store.clone())
        .with_retry(RetryPolicy::new(1, Duration::from_millis(1)));

    let mut query = pipeline(&source).with_content_fetcher(fetcher);
    query
        .filter_by_feed(Selector::Id("f2".into()))
        .await
        .unwrap()
        .filter_by_active(true)
        .await
        .unwrap()
        .fetch_content(ContentKind::Markdown, Some(4))
        .await
        .unwrap();

    let rows = query.to_rows().unwrap();
    assert_eq!(rows.len(), 3);
    let filled: Vec<_> = rows
        .iter()
        .filter_map(|r| r.entry_content_markdown.as_deref())
        .collect();
    assert_eq!(filled, ["# Active notice"]);
    assert_eq!(store.gets("s3://content-bucket/f2/0.md"), 0);
    assert_eq!(store.gets("s3://content-bucket/f2/3.md"), 1);
}

#[tokio::test]
async fn fetch_content_rejects_zero_workers() {
    let source = Arc::new(banking());
    let mut query = pipeline(&source);
    query
        .filter_by_topic(Selector::Id("t1".into()))
        .await
        .unwrap();

    assert!(matches!(
        query.fetch_content(ContentKind::Markdown, Some(0)).await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn csv_export_writes_header_and_rows() {
    let source = Arc::new(banking());
    let mut query = pipeline(&source);
    query
        .filter_by_feed(Selector::Id("f1".into()))
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("entries.csv");
    query.to_csv(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<_> = text.split_terminator("\r\n").collect();
    assert_eq!(lines.len(), 11);
    assert!(lines[0].starts_with("topic_id,topic_name,topic_description"));
    assert!(lines[1].starts_with("t1,Banking Regulation,"));

    let records = query.to_records().unwrap();
    assert_eq!(records.len(), 10);
    assert_eq!(records[0]["feed_name"], "SEC Press Releases");
}
