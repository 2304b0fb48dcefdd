//! In-memory stores for exercising the engine without live databases.

use async_trait::async_trait;
use bson::{Bson, Document};
use chrono::{DateTime, TimeZone, Utc};
use common::{Error, Result, Watermark};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::{DocumentStore, RelationalSource};

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn ts_millis(secs: i64, millis: u32) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, millis * 1_000_000).unwrap()
}

pub fn user_row(id: &str, created_at: DateTime<Utc>) -> Value {
    json!({ "id": id, "created_at": created_at.to_rfc3339() })
}

pub fn opening_row(eco: &str, name: &str, created_at: DateTime<Utc>) -> Value {
    json!({ "eco": eco, "name": name, "created_at": created_at.to_rfc3339() })
}

/// Relational source applying the same truncated comparison as the SQL query.
#[derive(Default)]
pub struct MemorySource {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    failing: HashSet<String>,
    panic_on_fetches: usize,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(self, table: &str, rows: Vec<Value>) -> Self {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .extend(rows);
        self
    }

    pub fn failing(mut self, table: &str) -> Self {
        self.failing.insert(table.to_string());
        self
    }

    /// Panic on the first `count` fetches, whatever the table.
    pub fn panicking_for(mut self, count: usize) -> Self {
        self.panic_on_fetches = count;
        self
    }

    pub fn push(&self, table: &str, row: Value) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelationalSource for MemorySource {
    async fn fetch_rows(&self, table: &str, watermark: Watermark) -> Result<Vec<Value>> {
        let attempt = self.fetches.fetch_add(1, Ordering::SeqCst);
        if attempt < self.panic_on_fetches {
            panic!("source exploded on fetch {}", attempt);
        }
        if self.failing.contains(table) {
            return Err(Error::Internal(format!("{} is unreachable", table)));
        }

        let tables = self.tables.lock().unwrap();
        let rows = tables.get(table).cloned().unwrap_or_default();
        Ok(rows
            .into_iter()
            .filter(|row| {
                row.get("created_at")
                    .and_then(Value::as_str)
                    .and_then(schema::timestamp::parse)
                    .map_or(true, |created_at| watermark.admits(created_at))
            })
            .collect())
    }
}

/// Document store with optional unique keys and failing lookups.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
    unique: HashMap<String, Vec<&'static str>>,
    failing_lookups: HashSet<String>,
    inserts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unique(mut self, collection: &str, fields: &[&'static str]) -> Self {
        self.unique.insert(collection.to_string(), fields.to_vec());
        self
    }

    pub fn failing_lookup(mut self, collection: &str) -> Self {
        self.failing_lookups.insert(collection.to_string());
        self
    }

    /// Store a raw row as if it had been replicated earlier.
    pub fn seed(&self, collection: &str, row: Value) {
        let created_at = row
            .get("created_at")
            .and_then(Value::as_str)
            .and_then(schema::timestamp::parse)
            .unwrap();
        let mut document = bson::to_document(&row).unwrap();
        document.insert("created_at", bson::DateTime::from_chrono(created_at));
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(document);
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map_or(0, Vec::len)
    }

    /// Successful inserts since creation, seeds excluded.
    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn latest_created_at(&self, collection: &str) -> Result<Option<DateTime<Utc>>> {
        if self.failing_lookups.contains(collection) {
            return Err(Error::DocumentStoreError(format!("{} timed out", collection)));
        }

        let collections = self.collections.lock().unwrap();
        Ok(collections.get(collection).and_then(|documents| {
            documents
                .iter()
                .filter_map(|document| match document.get("created_at") {
                    Some(Bson::DateTime(instant)) => Some(instant.to_chrono()),
                    _ => None,
                })
                .max()
        }))
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<()> {
        let mut collections = self.collections.lock().unwrap();
        let documents = collections.entry(collection.to_string()).or_default();

        if let Some(fields) = self.unique.get(collection) {
            let clashes = documents
                .iter()
                .any(|existing| fields.iter().all(|f| existing.get(f) == document.get(f)));
            if clashes {
                return Err(Error::DuplicateKey(format!(
                    "E11000 duplicate key error collection: {}",
                    collection
                )));
            }
        }

        documents.push(document);
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
