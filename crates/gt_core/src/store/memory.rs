//! In-memory reference implementation of the document store.
//!
//! Used by the test suite and as executable documentation of the store
//! contract. Two switches make degraded-store behavior reproducible:
//! `set_indexes_available(false)` makes `query`/`count` fail with the
//! index-unavailable classification (the standings fallback trigger), and
//! `set_counts_available(false)` fails only the aggregate count query.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use super::error::{StoreError, INDEX_UNAVAILABLE_CODE};
use super::{DocumentStore, Filter, FilterOp, OrderBy, StoreResult, REV_FIELD};

type Collections = HashMap<String, BTreeMap<String, Value>>;

pub struct MemoryStore {
    collections: RwLock<Collections>,
    next_rev: AtomicU64,
    indexes_available: AtomicBool,
    counts_available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(Collections::new()),
            next_rev: AtomicU64::new(0),
            indexes_available: AtomicBool::new(true),
            counts_available: AtomicBool::new(true),
        }
    }

    /// A store whose secondary indexes are "still building": every
    /// `query`/`count` fails index-unavailable while `get`/`set`/`scan`
    /// keep working.
    pub fn without_indexes() -> Self {
        let store = Self::new();
        store.indexes_available.store(false, AtomicOrdering::SeqCst);
        store
    }

    pub fn set_indexes_available(&self, available: bool) {
        self.indexes_available
            .store(available, AtomicOrdering::SeqCst);
    }

    pub fn set_counts_available(&self, available: bool) {
        self.counts_available
            .store(available, AtomicOrdering::SeqCst);
    }

    fn next_rev(&self) -> u64 {
        self.next_rev.fetch_add(1, AtomicOrdering::SeqCst) + 1
    }

    fn missing_index_error(collection: &str) -> StoreError {
        StoreError::Backend {
            code: Some(INDEX_UNAVAILABLE_CODE.to_string()),
            message: format!(
                "query on '{collection}' requires a composite index which is still building"
            ),
        }
    }

    fn stamp_rev(doc: &mut Value, rev: u64) -> StoreResult<()> {
        let Some(fields) = doc.as_object_mut() else {
            return Err(StoreError::backend("document must be a JSON object"));
        };
        fields.insert(REV_FIELD.to_string(), Value::from(rev));
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        let collections = self.collections.read().unwrap();
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn set(&self, collection: &str, id: &str, mut doc: Value) -> StoreResult<()> {
        Self::stamp_rev(&mut doc, self.next_rev())?;
        let mut collections = self.collections.write().unwrap();
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);
        Ok(())
    }

    async fn set_with_rev(
        &self,
        collection: &str,
        id: &str,
        mut doc: Value,
        expected_rev: Option<u64>,
    ) -> StoreResult<()> {
        let mut collections = self.collections.write().unwrap();
        let docs = collections.entry(collection.to_string()).or_default();
        let current_rev = docs
            .get(id)
            .and_then(|current| current.get(REV_FIELD))
            .and_then(Value::as_u64);
        if current_rev != expected_rev {
            return Err(StoreError::RevisionConflict {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Self::stamp_rev(&mut doc, self.next_rev())?;
        docs.insert(id.to_string(), doc);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> StoreResult<()> {
        let Some(fields) = patch.as_object() else {
            return Err(StoreError::backend("update patch must be a JSON object"));
        };
        let rev = self.next_rev();
        let mut collections = self.collections.write().unwrap();
        let Some(doc) = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
        else {
            return Err(StoreError::Missing {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        };
        let Some(target) = doc.as_object_mut() else {
            return Err(StoreError::backend("stored document is not a JSON object"));
        };
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
        target.insert(REV_FIELD.to_string(), Value::from(rev));
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        order_by: Option<OrderBy>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Value>> {
        if !self.indexes_available.load(AtomicOrdering::SeqCst) {
            return Err(Self::missing_index_error(collection));
        }

        let collections = self.collections.read().unwrap();
        let mut rows: Vec<Value> = collections
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| matches_filters(doc, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(collections);

        if let Some(order) = order_by {
            rows.sort_by(|a, b| {
                let ordering = compare_fields(a, b, &order.field);
                if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn count(&self, collection: &str, filters: &[Filter]) -> StoreResult<u64> {
        if !self.indexes_available.load(AtomicOrdering::SeqCst) {
            return Err(Self::missing_index_error(collection));
        }
        if !self.counts_available.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::backend("aggregate count temporarily unavailable"));
        }

        let collections = self.collections.read().unwrap();
        let count = collections
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| matches_filters(doc, filters))
                    .count()
            })
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn scan(&self, collection: &str) -> StoreResult<Vec<Value>> {
        let collections = self.collections.read().unwrap();
        Ok(collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }
}

fn matches_filters(doc: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| {
        let Some(actual) = doc.get(&filter.field) else {
            return false;
        };
        match filter.op {
            FilterOp::Eq => match (actual.as_f64(), filter.value.as_f64()) {
                // Numeric equality ignores integer/float representation.
                (Some(a), Some(b)) => a == b,
                _ => actual == &filter.value,
            },
            FilterOp::Gte => match (actual.as_f64(), filter.value.as_f64()) {
                (Some(a), Some(b)) => a >= b,
                _ => false,
            },
        }
    })
}

fn compare_fields(a: &Value, b: &Value, field: &str) -> Ordering {
    let left = a.get(field);
    let right = b.get(field);
    match (
        left.and_then(Value::as_f64),
        right.and_then(Value::as_f64),
    ) {
        (Some(l), Some(r)) => l.total_cmp(&r),
        _ => match (left.and_then(Value::as_str), right.and_then(Value::as_str)) {
            (Some(l), Some(r)) => l.cmp(r),
            _ => Ordering::Equal,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_roundtrip_stamps_revision() {
        let store = MemoryStore::new();
        store.set("c", "a", json!({"x": 1})).await.unwrap();
        let doc = store.get("c", "a").await.unwrap().unwrap();
        assert_eq!(doc["x"], 1);
        assert_eq!(doc[REV_FIELD], 1);

        store.set("c", "a", json!({"x": 2})).await.unwrap();
        let doc = store.get("c", "a").await.unwrap().unwrap();
        assert_eq!(doc[REV_FIELD], 2);
    }

    #[tokio::test]
    async fn test_set_with_rev_detects_stale_revision() {
        let store = MemoryStore::new();
        store.set("c", "a", json!({"x": 1})).await.unwrap();
        let rev = store.get("c", "a").await.unwrap().unwrap()[REV_FIELD]
            .as_u64()
            .unwrap();

        // A competing write moves the revision.
        store.set("c", "a", json!({"x": 2})).await.unwrap();

        let result = store.set_with_rev("c", "a", json!({"x": 3}), Some(rev)).await;
        assert!(matches!(result, Err(StoreError::RevisionConflict { .. })));
    }

    #[tokio::test]
    async fn test_set_with_rev_none_requires_absence() {
        let store = MemoryStore::new();
        store.set_with_rev("c", "a", json!({"x": 1}), None).await.unwrap();
        let result = store.set_with_rev("c", "a", json!({"x": 2}), None).await;
        assert!(matches!(result, Err(StoreError::RevisionConflict { .. })));
    }

    #[tokio::test]
    async fn test_update_merges_shallowly() {
        let store = MemoryStore::new();
        store.set("c", "a", json!({"x": 1, "y": 1})).await.unwrap();
        store.update("c", "a", json!({"y": 2, "z": 3})).await.unwrap();

        let doc = store.get("c", "a").await.unwrap().unwrap();
        assert_eq!(doc["x"], 1);
        assert_eq!(doc["y"], 2);
        assert_eq!(doc["z"], 3);
    }

    #[tokio::test]
    async fn test_update_missing_document_fails() {
        let store = MemoryStore::new();
        let result = store.update("c", "nope", json!({"x": 1})).await;
        assert!(matches!(result, Err(StoreError::Missing { .. })));
    }

    #[tokio::test]
    async fn test_query_filters_sorts_and_limits() {
        let store = MemoryStore::new();
        for (id, score, games) in [("a", 1100.0, 12), ("b", 1300.0, 3), ("c", 1200.0, 8)] {
            store
                .set("c", id, json!({"id": id, "score": score, "games": games}))
                .await
                .unwrap();
        }

        let rows = store
            .query(
                "c",
                &[Filter::gte("games", 5)],
                Some(OrderBy::desc("score")),
                Some(1),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "c");
    }

    #[tokio::test]
    async fn test_missing_indexes_fail_queries_but_not_scans() {
        let store = MemoryStore::without_indexes();
        store.set("c", "a", json!({"x": 1})).await.unwrap();

        let err = store.query("c", &[], None, None).await.unwrap_err();
        assert!(err.is_index_unavailable());
        let err = store.count("c", &[]).await.unwrap_err();
        assert!(err.is_index_unavailable());

        assert_eq!(store.scan("c").await.unwrap().len(), 1);
        assert!(store.get("c", "a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_count_switch_fails_counts_only() {
        let store = MemoryStore::new();
        store.set("c", "a", json!({"x": 1})).await.unwrap();
        store.set_counts_available(false);

        assert_eq!(store.query("c", &[], None, None).await.unwrap().len(), 1);
        let err = store.count("c", &[]).await.unwrap_err();
        assert!(!err.is_index_unavailable());
    }
}
