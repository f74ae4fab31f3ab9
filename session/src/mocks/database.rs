//! Mock document database for testing.

use crate::error::{Result, SessionError};
use crate::providers::{Direction, DocumentDatabase, DocumentUpdate, Query};
use crate::state::Document;
use quill_core::environment::{Clock, SystemClock};
use serde_json::Value;
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

type Collections = HashMap<String, BTreeMap<String, Document>>;

/// Mock document database.
///
/// Uses in-memory storage for testing. Reads can be delayed or made to
/// fail per document id, which is how tests stage overlapping fetches.
#[derive(Clone)]
pub struct MockDocumentDatabase {
    collections: Arc<Mutex<Collections>>,
    get_calls: Arc<AtomicUsize>,
    write_calls: Arc<AtomicUsize>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    fail_writes: Arc<AtomicBool>,
    clock: Arc<dyn Clock>,
    next_id: Arc<AtomicUsize>,
}

impl MockDocumentDatabase {
    /// Create an empty mock database using the system clock for server
    /// timestamps.
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: Arc::new(Mutex::new(HashMap::new())),
            get_calls: Arc::new(AtomicUsize::new(0)),
            write_calls: Arc::new(AtomicUsize::new(0)),
            delays: Arc::new(Mutex::new(HashMap::new())),
            failing: Arc::new(Mutex::new(HashSet::new())),
            fail_writes: Arc::new(AtomicBool::new(false)),
            clock: Arc::new(SystemClock),
            next_id: Arc::new(AtomicUsize::new(1)),
        }
    }

    /// Resolve server timestamps with `clock`.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Store a document directly.
    pub fn insert(&self, collection: &str, id: &str, document: Document) {
        self.lock()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);
    }

    /// Current content of a document (for testing).
    #[must_use]
    pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
        self.lock().get(collection).and_then(|docs| docs.get(id)).cloned()
    }

    /// Number of `get_document` calls (for testing).
    #[must_use]
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Number of write calls of any kind (for testing).
    #[must_use]
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Delay every `get_document` for `id`.
    pub fn delay_document(&self, id: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), delay);
    }

    /// Make every `get_document` for `id` fail with a transport error.
    pub fn fail_document(&self, id: &str) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string());
    }

    /// Make subsequent writes fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Collections> {
        self.collections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_write(&self) -> Result<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SessionError::Transport("write rejected".to_string()));
        }
        Ok(())
    }

    fn put(&self, collection: &str, id: &str, write: &DocumentUpdate) {
        let mut document = Document::new();
        write.apply_to(&mut document, self.clock.now());
        self.insert(collection, id, document);
    }
}

impl Default for MockDocumentDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockDocumentDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDocumentDatabase")
            .field("get_calls", &self.get_calls())
            .field("write_calls", &self.write_calls())
            .finish_non_exhaustive()
    }
}

/// Firestore-like ordering: numbers, then strings, then everything else.
fn compare_values(a: &Value, b: &Value) -> CmpOrdering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

impl DocumentDatabase for MockDocumentDatabase {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self
            .delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
        {
            return Err(SessionError::Transport(format!("unavailable: {collection}/{id}")));
        }

        Ok(self.document(collection, id))
    }

    async fn set_document(&self, collection: &str, id: &str, write: DocumentUpdate) -> Result<()> {
        self.begin_write()?;
        self.put(collection, id, &write);
        Ok(())
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        update: DocumentUpdate,
    ) -> Result<()> {
        self.begin_write()?;
        let now = self.clock.now();

        let mut collections = self.lock();
        let document = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| SessionError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        update.apply_to(document, now);
        Ok(())
    }

    async fn add_document(&self, collection: &str, write: DocumentUpdate) -> Result<String> {
        self.begin_write()?;
        let id = format!("doc-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.put(collection, &id, &write);
        Ok(id)
    }

    async fn query(&self, collection: &str, query: Query) -> Result<Vec<(String, Document)>> {
        let collections = self.lock();
        let Some(documents) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut results: Vec<(String, Document)> = documents
            .iter()
            .filter(|(_, document)| {
                query
                    .filters
                    .iter()
                    .all(|(field, value)| document.get(field) == Some(value))
            })
            .filter(|(_, document)| {
                query
                    .order_by
                    .as_ref()
                    .is_none_or(|(field, _)| document.contains_key(field))
            })
            .map(|(id, document)| (id.clone(), document.clone()))
            .collect();

        if let Some((field, direction)) = &query.order_by {
            results.sort_by(|(_, a), (_, b)| {
                let ordering = compare_values(
                    a.get(field).unwrap_or(&Value::Null),
                    b.get(field).unwrap_or(&Value::Null),
                );
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            results.truncate(limit);
        }

        Ok(results)
    }
}
