//! # Document-store boundary
//!
//! The pipeline is written against a generic key-document store offering
//! per-document get/set/update, conditional (revision-checked) writes,
//! and best-effort indexed range queries that may fail while an index is
//! missing or still building. No multi-document transaction is assumed
//! anywhere.
//!
//! [`MemoryStore`] is the in-memory reference implementation used by the
//! test suite; [`TtlCache`] is the explicit cache abstraction components
//! own when they need one.

pub mod cache;
pub mod error;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

pub use cache::TtlCache;
pub use error::{StoreError, INDEX_UNAVAILABLE_CODE};
pub use memory::MemoryStore;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Reserved document field carrying the store-maintained revision.
pub const REV_FIELD: &str = "_rev";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
}

/// One predicate of an indexed range query.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Gte,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }
}

/// Generic async key-document store.
///
/// Documents are JSON objects. Implementations stamp [`REV_FIELD`] on
/// every write; readers treat it as opaque.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>>;

    /// Unconditional upsert.
    async fn set(&self, collection: &str, id: &str, doc: Value) -> StoreResult<()>;

    /// Conditional upsert: succeeds only while the stored revision still
    /// equals `expected_rev` (`None` = the document must not exist yet).
    /// Fails with [`StoreError::RevisionConflict`] otherwise.
    async fn set_with_rev(
        &self,
        collection: &str,
        id: &str,
        doc: Value,
        expected_rev: Option<u64>,
    ) -> StoreResult<()>;

    /// Shallow-merge a JSON object into an existing document.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> StoreResult<()>;

    /// Indexed range query. May fail with an index-unavailable
    /// classification (see [`StoreError::is_index_unavailable`]) while a
    /// required index is missing or still building.
    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        order_by: Option<OrderBy>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Value>>;

    /// Count documents matching `filters`. Best-effort; callers must
    /// tolerate failure.
    async fn count(&self, collection: &str, filters: &[Filter]) -> StoreResult<u64>;

    /// Full collection scan. Works without any secondary index.
    async fn scan(&self, collection: &str) -> StoreResult<Vec<Value>>;
}

/// Optimistic read-modify-write.
///
/// Reads the current document, lets `mutate` build the replacement
/// (`None` input means the document does not exist yet), and writes it
/// back conditionally. Retries only on revision conflicts, up to
/// `max_attempts`; any other failure propagates unchanged. Returns the
/// document that was written.
pub async fn update_with_retry<F>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    max_attempts: u32,
    mut mutate: F,
) -> StoreResult<Value>
where
    F: FnMut(Option<Value>) -> StoreResult<Value> + Send,
{
    let attempts = max_attempts.max(1);
    let mut conflict = None;
    for attempt in 1..=attempts {
        let current = store.get(collection, id).await?;
        let expected_rev = current
            .as_ref()
            .and_then(|doc| doc.get(REV_FIELD))
            .and_then(Value::as_u64);
        let next = mutate(current)?;
        match store.set_with_rev(collection, id, next.clone(), expected_rev).await {
            Ok(()) => return Ok(next),
            Err(err) if err.is_revision_conflict() => {
                log::debug!(
                    "revision conflict on {}/{} (attempt {}/{}), retrying",
                    collection,
                    id,
                    attempt,
                    attempts
                );
                conflict = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    Err(conflict.unwrap_or_else(|| StoreError::backend("update_with_retry made no attempt")))
}
