// src/pipeline/query.rs

//! Lazy, chainable filtering over a cached entry table.
//!
//! A [`QueryPipeline`] starts unloaded. The first topic or feed filter loads
//! only that slice through the narrow endpoints; later calls filter the
//! cached rows in place. Filters return `&mut Self`, so one pipeline has a
//! single writer at a time; use separate pipelines for concurrent queries.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{export, view};
use crate::error::{AppError, Result};
use crate::models::{Config, ContentKind, Field, HierarchyRow};
use crate::services::{
    ApiClient, EndpointRouter, FeedSource, FilterIntent, PAGE_SIZE_CEILING, Selector,
};
use crate::storage::{ContentFetcher, DEFAULT_MAX_WORKERS, worker_count};

/// Keyword search across one or more text fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Search {
    pub keywords: Vec<String>,
    pub fields: Vec<Field>,
    pub case_sensitive: bool,
    /// Every keyword must match (AND); otherwise any keyword (OR)
    pub match_all: bool,
}

impl Search {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            fields: Field::DEFAULT_SEARCH.to_vec(),
            case_sensitive: false,
            match_all: false,
        }
    }

    pub fn in_fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.fields = fields.into_iter().collect();
        self
    }

    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    pub fn match_all(mut self, yes: bool) -> Self {
        self.match_all = yes;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(AppError::filter("search needs at least one keyword"));
        }
        if self.fields.is_empty() {
            return Err(AppError::filter("search needs at least one field"));
        }
        Ok(())
    }

    fn matches(&self, row: &HierarchyRow) -> bool {
        let mut keywords = self.keywords.iter().filter(|k| !k.trim().is_empty());
        let hit = |keyword: &String| {
            self.fields.iter().any(|field| {
                field
                    .value(row)
                    .is_some_and(|text| contains(text, keyword, self.case_sensitive))
            })
        };
        if self.match_all {
            keywords.all(hit)
        } else {
            keywords.any(hit)
        }
    }
}

#[derive(Debug)]
enum State {
    Unloaded,
    Loaded(Vec<HierarchyRow>),
}

/// Chainable query over topics, feeds and entries.
pub struct QueryPipeline {
    router: EndpointRouter,
    fetcher: ContentFetcher,
    allow_full_scan: bool,
    max_workers: usize,
    state: State,
    version: u64,
}

impl std::fmt::Debug for QueryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPipeline")
            .field("allow_full_scan", &self.allow_full_scan)
            .field("max_workers", &self.max_workers)
            .field("state", &self.state)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl QueryPipeline {
    /// Pipeline over any feed source, without content access.
    pub fn new(source: Arc<dyn FeedSource>) -> Self {
        Self {
            router: EndpointRouter::new(source, PAGE_SIZE_CEILING),
            fetcher: ContentFetcher::disabled(),
            allow_full_scan: false,
            max_workers: DEFAULT_MAX_WORKERS,
            state: State::Unloaded,
            version: 0,
        }
    }

    /// Pipeline backed by the API client and object store from `config`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let client = ApiClient::new(&config.api)?;
        let page_size = client.page_size();
        let fetcher = ContentFetcher::from_config(config).await?;

        Ok(Self::new(Arc::new(client))
            .with_page_size(page_size)
            .with_content_fetcher(fetcher)
            .with_max_workers(config.storage.max_workers)
            .allow_full_scan(config.query.allow_full_scan))
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        let source = self.router.source();
        self.router = EndpointRouter::new(source, page_size);
        self
    }

    pub fn with_content_fetcher(mut self, fetcher: ContentFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Default worker count for [`Self::fetch_content`].
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Allow a search or export with no prior topic/feed filter to load
    /// every entry.
    pub fn allow_full_scan(mut self, allow: bool) -> Self {
        self.allow_full_scan = allow;
        self
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, State::Loaded(_))
    }

    /// Increments on every change to the cached table.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Rows currently cached; zero while unloaded.
    pub fn len(&self) -> usize {
        match &self.state {
            State::Loaded(rows) => rows.len(),
            State::Unloaded => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the cache; the next filter loads afresh.
    pub fn reset(&mut self) -> &mut Self {
        if self.is_loaded() {
            self.state = State::Unloaded;
            self.version += 1;
            log::debug!("Query cache cleared");
        }
        self
    }

    /// Load every entry without narrowing. Subject to the full-scan opt-in.
    pub async fn load(&mut self) -> Result<&mut Self> {
        self.ensure_loaded("load").await?;
        Ok(self)
    }

    /// Keep rows whose topic matches. Loads through the topic endpoint when
    /// nothing is cached yet.
    pub async fn filter_by_topic(&mut self, selector: Selector) -> Result<&mut Self> {
        if !self.is_loaded() {
            self.load_intent(&FilterIntent::Topic(selector.clone())).await?;
        }
        self.retain("topic", |row| match &selector {
            Selector::Id(id) => &row.topic_id == id,
            Selector::Name(name) => contains(&row.topic_name, name, false),
        })
    }

    /// Keep rows whose feed matches. Loads through the feed endpoint when
    /// nothing is cached yet.
    pub async fn filter_by_feed(&mut self, selector: Selector) -> Result<&mut Self> {
        if !self.is_loaded() {
            self.load_intent(&FilterIntent::Feed(selector.clone())).await?;
        }
        self.retain("feed", |row| match &selector {
            Selector::Id(id) => row.feed_id.as_deref() == Some(id.as_str()),
            Selector::Name(name) => row
                .feed_name
                .as_deref()
                .is_some_and(|feed| contains(feed, name, false)),
        })
    }

    /// Keep rows whose `field` contains `needle`.
    pub async fn filter_by_field(
        &mut self,
        field: Field,
        needle: &str,
        case_sensitive: bool,
    ) -> Result<&mut Self> {
        if needle.is_empty() {
            return Err(AppError::filter(format!("empty match text for {field}")));
        }
        self.ensure_loaded("filter_by_field").await?;
        self.retain(field.column(), |row| {
            field
                .value(row)
                .is_some_and(|text| contains(text, needle, case_sensitive))
        })
    }

    /// Keep rows matching a keyword search.
    pub async fn search(&mut self, search: &Search) -> Result<&mut Self> {
        search.validate()?;
        self.ensure_loaded("search").await?;
        self.retain("search", |row| search.matches(row))
    }

    /// Keep rows published within `[start, end]`. Rows with no publication
    /// time never match.
    pub async fn filter_by_date(
        &mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<&mut Self> {
        if start.is_none() && end.is_none() {
            return Err(AppError::filter("date filter needs a start or an end"));
        }
        if let (Some(start), Some(end)) = (start, end)
            && start > end
        {
            return Err(AppError::filter(format!(
                "date range start {start} is after end {end}"
            )));
        }
        self.ensure_loaded("filter_by_date").await?;
        self.retain("date", |row| {
            row.entry_published_at.is_some_and(|published| {
                start.is_none_or(|s| published >= s) && end.is_none_or(|e| published <= e)
            })
        })
    }

    /// Keep rows whose entry active flag equals `active`.
    pub async fn filter_by_active(&mut self, active: bool) -> Result<&mut Self> {
        self.ensure_loaded("filter_by_active").await?;
        self.retain("active", |row| row.entry_is_active == Some(active))
    }

    /// Resolve stored bodies for the cached rows and write them into the
    /// content column.
    ///
    /// Run this after narrowing filters so that only the remaining rows are
    /// fetched. Paths that fail leave the existing column value untouched.
    pub async fn fetch_content(
        &mut self,
        kind: ContentKind,
        max_workers: Option<usize>,
    ) -> Result<&mut Self> {
        let workers = worker_count(max_workers.unwrap_or(self.max_workers))?;
        self.ensure_loaded("fetch_content").await?;

        let paths: Vec<String> = self
            .rows()
            .iter()
            .filter_map(|row| content_path(row, kind).map(str::to_string))
            .collect();
        if paths.is_empty() {
            log::info!("No content paths among {} rows", self.len());
            return Ok(self);
        }

        let bodies = self.fetcher.fetch_batch(&paths, workers).await?;

        let mut filled = 0usize;
        if let State::Loaded(rows) = &mut self.state {
            for row in rows.iter_mut() {
                let Some(body) = content_path(row, kind)
                    .and_then(|path| bodies.get(path))
                    .and_then(|body| body.clone())
                else {
                    continue;
                };
                match kind {
                    ContentKind::Html => row.entry_content_html = Some(body),
                    ContentKind::Markdown | ContentKind::AggregatedMarkdown => {
                        row.entry_content_markdown = Some(body)
                    }
                }
                filled += 1;
            }
        }
        if filled > 0 {
            self.version += 1;
        }
        log::info!("Filled content for {filled} rows");
        Ok(self)
    }

    /// Copy of the cached rows.
    pub fn to_rows(&self) -> Result<Vec<HierarchyRow>> {
        Ok(self.loaded_rows()?.to_vec())
    }

    /// Cached rows as JSON objects.
    pub fn to_records(&self) -> Result<Vec<Value>> {
        export::to_records(self.loaded_rows()?)
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        export::to_json(self.loaded_rows()?, pretty)
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        export::write_csv(self.loaded_rows()?, writer)
    }

    /// Write the cached rows to a CSV file.
    pub fn to_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let rows = self.loaded_rows()?;
        let file = File::create(path.as_ref())?;
        export::write_csv(rows, BufWriter::new(file))?;
        log::info!("Exported {} rows to {:?}", rows.len(), path.as_ref());
        Ok(())
    }

    async fn ensure_loaded(&mut self, operation: &str) -> Result<()> {
        if self.is_loaded() {
            return Ok(());
        }
        if !self.allow_full_scan {
            return Err(AppError::filter(format!(
                "{operation} without a topic or feed filter would scan every entry; \
                 filter by topic or feed first, or enable allow_full_scan"
            )));
        }
        log::info!("{operation}: no topic or feed filter set, loading all entries");
        self.load_intent(&FilterIntent::Unfiltered).await
    }

    async fn load_intent(&mut self, intent: &FilterIntent) -> Result<()> {
        let output = self.router.fetch(intent).await?;
        let rows = view::build(&output.topics, &output.feeds, &output.entries, true);
        log::info!("Loaded {} rows for {intent:?}", rows.len());
        self.state = State::Loaded(rows);
        self.version += 1;
        Ok(())
    }

    fn rows(&self) -> &[HierarchyRow] {
        match &self.state {
            State::Loaded(rows) => rows,
            State::Unloaded => &[],
        }
    }

    fn loaded_rows(&self) -> Result<&[HierarchyRow]> {
        match &self.state {
            State::Loaded(rows) => Ok(rows),
            State::Unloaded => Err(AppError::filter(
                "nothing loaded yet; filter by topic or feed (or call load) first",
            )),
        }
    }

    fn retain(
        &mut self,
        label: &str,
        keep: impl Fn(&HierarchyRow) -> bool,
    ) -> Result<&mut Self> {
        if let State::Loaded(rows) = &mut self.state {
            let before = rows.len();
            rows.retain(|row| keep(row));
            if rows.len() != before {
                self.version += 1;
            }
            log::debug!("{label} filter kept {}/{before} rows", rows.len());
        }
        Ok(self)
    }
}

fn content_path(row: &HierarchyRow, kind: ContentKind) -> Option<&str> {
    match kind {
        ContentKind::Markdown => row.entry_md_path.as_deref(),
        ContentKind::Html => row.entry_html_path.as_deref(),
        ContentKind::AggregatedMarkdown => row.entry_aggregated_md_path.as_deref(),
    }
    .filter(|p| !p.trim().is_empty())
}

fn contains(haystack: &str, needle: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        haystack.contains(needle)
    } else {
        haystack.to_lowercase().contains(&needle.to_lowercase())
    }
}
