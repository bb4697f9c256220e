//! ## Session Result Cache
//!
//! A session-scoped memo for the expensive, repeatable steps of the pipeline:
//! raw fetched bytes (keyed by URL) and loaded or enriched tables (keyed by
//! operation, resource, and column set). The underlying dataset is immutable
//! for the lifetime of a session, so entries are never invalidated or
//! evicted; a filter change must never cost a second download or join.
//!
//! The cache is an explicit object, injected into the session rather than
//! ambient global state, so tests can substitute a fresh cache per test.
//! Stored values are immutable once computed; the interior mutex only guards
//! the map itself.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use datafusion::datasource::MemTable;
use datafusion::prelude::{DataFrame, SessionContext};
use tracing::debug;

use crate::exceptions::TripBoardResult;

/// Identity of a cached table computation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// The operation that produced the value, e.g. `"load_trips"`.
    pub op: &'static str,
    /// The resource the operation read, typically a URL.
    pub resource: String,
    /// The column set requested, empty when the full table was read.
    pub columns: Vec<String>,
}

impl CacheKey {
    pub fn new(op: &'static str, resource: impl Into<String>, columns: &[String]) -> Self {
        Self {
            op,
            resource: resource.into(),
            columns: columns.to_vec(),
        }
    }
}

/// A fully materialized table held by the cache.
///
/// Stored as record batches rather than a `DataFrame` so the same data can be
/// re-planned against any session context without re-decoding.
#[derive(Debug)]
pub struct CachedTable {
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
}

impl CachedTable {
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self { schema, batches }
    }

    /// Total rows across all batches.
    pub fn row_count(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }

    /// Wraps the cached batches in a fresh lazy `DataFrame`. Cheap: record
    /// batches are reference-counted, so no data is copied.
    pub fn to_frame(&self, ctx: &SessionContext) -> TripBoardResult<DataFrame> {
        let table = MemTable::try_new(self.schema.clone(), vec![self.batches.clone()])?;
        Ok(ctx.read_table(Arc::new(table))?)
    }
}

/// The process-wide memo shared by every component of one session.
#[derive(Debug, Default)]
pub struct SessionCache {
    bytes: Mutex<HashMap<String, Bytes>>,
    tables: Mutex<HashMap<CacheKey, Arc<CachedTable>>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns previously fetched bytes for `url`, if any.
    pub fn bytes(&self, url: &str) -> Option<Bytes> {
        let hit = lock(&self.bytes).get(url).cloned();
        debug!(url, hit = hit.is_some(), "byte cache lookup");
        hit
    }

    /// Stores fetched bytes for `url`. If another caller stored the value
    /// first, the existing entry wins and is returned.
    pub fn store_bytes(&self, url: &str, payload: Bytes) -> Bytes {
        lock(&self.bytes)
            .entry(url.to_string())
            .or_insert(payload)
            .clone()
    }

    /// Returns the cached table for `key`, if any.
    pub fn table(&self, key: &CacheKey) -> Option<Arc<CachedTable>> {
        let hit = lock(&self.tables).get(key).cloned();
        debug!(op = key.op, resource = %key.resource, hit = hit.is_some(), "table cache lookup");
        hit
    }

    /// Stores a computed table under `key`. The first stored value for a key
    /// wins; later callers observe it instead of replacing it.
    pub fn store_table(&self, key: CacheKey, table: Arc<CachedTable>) -> Arc<CachedTable> {
        lock(&self.tables).entry(key).or_insert(table).clone()
    }
}

// A poisoned mutex only means another thread panicked mid-insert; the map
// itself is still coherent, so recover the guard rather than propagating.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
