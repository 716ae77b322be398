//! # coursegrid-store
//!
//! Storage backends for coursegrid.
//!
//! This crate provides:
//! - `MemoryDocumentStore`: ordered in-memory collections, loadable from a
//!   directory of JSON snapshots (one `<collection>.json` file each)
//! - `TracedStore`: a `DocumentStore` wrapper that logs and counts accesses
//! - `LocalObjectStore`: filesystem object storage issuing signed, expiring URLs
//!
//! ## Snapshot format
//!
//! A collection file is either an array of objects carrying an `id` field
//! (document order is preserved) or an object keyed by document id.
//!
//! ```json
//! [
//!   {"id": "C1", "name": "Safety", "unit": "HR", "quarter": "2"},
//!   {"id": "C2", "name": "Ethics", "unit": "HR", "quarter": "1"}
//! ]
//! ```

pub mod object;

pub use object::LocalObjectStore;

use coursegrid_core::{Document, DocumentStore, Filter, StoreError};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace};

/// In-memory document store with insertion-ordered collections
#[derive(Clone, Debug, Default)]
pub struct MemoryDocumentStore {
    collections: HashMap<String, Vec<Document>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document; replacement keeps the original position
    pub fn insert(&mut self, collection: &str, doc: Document) {
        let docs = self.collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|d| d.id == doc.id) {
            Some(existing) => *existing = doc,
            None => docs.push(doc),
        }
    }

    /// Builder form of `insert`
    pub fn with(mut self, collection: &str, id: impl Into<String>, data: Value) -> Self {
        self.insert(collection, Document::new(id, data));
        self
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, Vec::len)
    }

    /// Load every `*.json` file in `dir` as a collection named after the file stem
    pub fn load_dir(dir: &Path) -> Result<Self, StoreError> {
        let mut store = Self::new();
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in paths {
            let Some(collection) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = std::fs::read_to_string(&path)?;
            let docs = parse_collection(collection, &text)?;
            debug!(collection, documents = docs.len(), "loaded snapshot");
            for doc in docs {
                store.insert(collection, doc);
            }
        }
        Ok(store)
    }
}

/// Parse one collection snapshot
pub fn parse_collection(collection: &str, text: &str) -> Result<Vec<Document>, StoreError> {
    let value: Value = serde_json::from_str(text).map_err(|source| StoreError::Malformed {
        collection: collection.to_string(),
        source,
    })?;

    let docs = match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| {
                let id = match item.get("id") {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    _ => format!("{collection}-{idx}"),
                };
                Document::new(id, item)
            })
            .collect(),
        Value::Object(map) => map
            .into_iter()
            .map(|(id, data)| Document::new(id, data))
            .collect(),
        _ => Vec::new(),
    };
    Ok(docs)
}

impl DocumentStore for MemoryDocumentStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    fn query(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    fn get_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        Ok(self.collections.get(collection).cloned().unwrap_or_default())
    }
}

/// Wraps a store, tracing and counting every access
#[derive(Debug)]
pub struct TracedStore<S> {
    inner: S,
    accesses: AtomicUsize,
}

impl<S: DocumentStore> TracedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            accesses: AtomicUsize::new(0),
        }
    }

    /// Number of store calls made so far
    pub fn accesses(&self) -> usize {
        self.accesses.load(Ordering::Relaxed)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn record(&self, op: &str, collection: &str) {
        self.accesses.fetch_add(1, Ordering::Relaxed);
        trace!(op, collection, "document store access");
    }
}

impl<S: DocumentStore> DocumentStore for TracedStore<S> {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.record("get", collection);
        self.inner.get(collection, id)
    }

    fn query(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        self.record("query", collection);
        self.inner.query(collection, filter)
    }

    fn get_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.record("get_all", collection);
        self.inner.get_all(collection)
    }
}
