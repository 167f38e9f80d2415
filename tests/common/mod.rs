//! In-memory feed source and object store shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use regfeeds::Result;
use regfeeds::models::{Entry, Feed, Topic};
use regfeeds::services::{Endpoint, FeedSource};
use regfeeds::storage::{ContentPath, FetchError, ObjectStore};
use serde_json::{Value, json};

pub fn topic(id: &str, name: &str) -> Topic {
    serde_json::from_value(json!({"id": id, "name": name})).unwrap()
}

pub fn feed(id: &str, name: &str, topic_id: &str) -> Feed {
    serde_json::from_value(json!({
        "id": id,
        "name": name,
        "url": format!("https://example.com/{id}"),
        "topic": {"id": topic_id}
    }))
    .unwrap()
}

pub fn entry(value: Value) -> Entry {
    serde_json::from_value(value).unwrap()
}

/// Canned catalog. Entry endpoints return the entries registered for them;
/// the broad endpoint returns every registered entry once.
#[derive(Default)]
pub struct FakeSource {
    pub topics: Vec<Topic>,
    pub feeds: Vec<Feed>,
    pub entries: HashMap<Endpoint, Vec<Entry>>,
    pub calls: Mutex<Vec<Endpoint>>,
}

impl FakeSource {
    pub fn with_entries(mut self, endpoint: Endpoint, entries: Vec<Entry>) -> Self {
        self.entries.insert(endpoint, entries);
        self
    }

    pub fn calls(&self) -> Vec<Endpoint> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedSource for FakeSource {
    async fn topics(&self) -> Result<Vec<Topic>> {
        Ok(self.topics.clone())
    }

    async fn feeds(&self) -> Result<Vec<Feed>> {
        Ok(self.feeds.clone())
    }

    async fn entries(&self, endpoint: &Endpoint, _page_size: usize) -> Result<Vec<Entry>> {
        self.calls.lock().unwrap().push(endpoint.clone());
        if *endpoint == Endpoint::AllEntries {
            let mut all: Vec<Entry> = self.entries.values().flatten().cloned().collect();
            all.sort_by(|a, b| a.id.cmp(&b.id));
            all.dedup_by(|a, b| a.id == b.id);
            return Ok(all);
        }
        Ok(self.entries.get(endpoint).cloned().unwrap_or_default())
    }
}

/// Objects keyed by their `s3://` path. Scripted failures for a key are
/// returned first, in order, before the stored object. A delayed key sleeps
/// before every answer.
#[derive(Default)]
pub struct FakeStore {
    pub objects: HashMap<String, Vec<u8>>,
    pub delays: HashMap<String, Duration>,
    pub failures: Mutex<HashMap<String, VecDeque<FetchError>>>,
    pub gets: Mutex<HashMap<String, u32>>,
}

impl FakeStore {
    pub fn with_object(mut self, path: &str, body: &str) -> Self {
        self.objects.insert(path.to_string(), body.as_bytes().to_vec());
        self
    }

    pub fn with_delay(mut self, path: &str, delay: Duration) -> Self {
        self.delays.insert(path.to_string(), delay);
        self
    }

    pub fn with_failures(self, path: &str, failures: impl IntoIterator<Item = FetchError>) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(path.to_string(), failures.into_iter().collect());
        self
    }

    pub fn gets(&self, path: &str) -> u32 {
        self.gets.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn get_object(
        &self,
        path: &ContentPath,
        max_bytes: u64,
    ) -> std::result::Result<Vec<u8>, FetchError> {
        let key = path.to_string();
        *self.gets.lock().unwrap().entry(key.clone()).or_default() += 1;
        if let Some(delay) = self.delays.get(&key) {
            tokio::time::sleep(*delay).await;
        }

        if let Some(err) = self
            .failures
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        let body = self.objects.get(&key).ok_or(FetchError::NotFound)?;
        if body.len() as u64 > max_bytes {
            return Err(FetchError::TooLarge { limit: max_bytes });
        }
        Ok(body.clone())
    }
}
