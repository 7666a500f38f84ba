//! Optimistic-concurrency persistence of extraction/conversion records.
//!
//! Every record carries a row version the store increments on each
//! successful update; an update must name the version it last observed or
//! it is rejected with a conflict. That conditional update is the only
//! mutation-ordering guarantee — there is no other locking, so callers
//! react to a conflict by reloading and retrying, never by overwriting.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// A concurrent write beat this one; reload the record and retry.
#[derive(Debug, Clone, Error)]
#[error("optimistic lock conflict on {table}/{id}: version {expected_version} is stale")]
pub struct OptimisticLockError {
    pub table: String,
    pub id: String,
    /// The version the caller last observed.
    pub expected_version: u64,
}

/// Storage errors. [`StoreError::Conflict`] is its own variant so callers
/// can special-case "reload and retry" against hard failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error(transparent)]
    Conflict(#[from] OptimisticLockError),

    #[error("record {table}/{id} not found")]
    NotFound { table: String, id: String },

    #[error("record {table}/{id} already exists")]
    AlreadyExists { table: String, id: String },

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A stored row: opaque payload plus the store-owned version counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionedRecord {
    pub id: String,
    /// Incremented by the store on every successful update. Callers never
    /// write this field directly.
    pub version: u64,
    pub data: serde_json::Value,
}

/// A key-addressable store with optimistic-concurrency updates.
#[async_trait]
pub trait VersionedStore: Send + Sync {
    /// Load a record.
    async fn get(&self, table: &str, id: &str) -> Result<VersionedRecord, StoreError>;

    /// Create a record at version 1.
    async fn insert(
        &self,
        table: &str,
        id: &str,
        data: serde_json::Value,
    ) -> Result<VersionedRecord, StoreError>;

    /// Conditionally update: applied only where the stored version equals
    /// `expected_version` (the SQL shape is `WHERE version = ?`). When the
    /// condition matches zero rows — stale version or vanished record —
    /// nothing is mutated and the call fails with a conflict carrying the
    /// table, id, and the version that failed.
    async fn update(
        &self,
        table: &str,
        id: &str,
        expected_version: u64,
        data: serde_json::Value,
    ) -> Result<VersionedRecord, StoreError>;
}

/// In-memory reference implementation of the versioned-store protocol.
///
/// Used in tests and as the semantics any backing store must match.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, HashMap<String, VersionedRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VersionedStore for MemoryStore {
    async fn get(&self, table: &str, id: &str) -> Result<VersionedRecord, StoreError> {
        self.tables
            .read()
            .await
            .get(table)
            .and_then(|rows| rows.get(id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                table: table.into(),
                id: id.into(),
            })
    }

    async fn insert(
        &self,
        table: &str,
        id: &str,
        data: serde_json::Value,
    ) -> Result<VersionedRecord, StoreError> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        if rows.contains_key(id) {
            return Err(StoreError::AlreadyExists {
                table: table.into(),
                id: id.into(),
            });
        }
        let record = VersionedRecord {
            id: id.to_string(),
            version: 1,
            data,
        };
        rows.insert(id.to_string(), record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        expected_version: u64,
        data: serde_json::Value,
    ) -> Result<VersionedRecord, StoreError> {
        let mut tables = self.tables.write().await;
        let row = tables.get_mut(table).and_then(|rows| rows.get_mut(id));

        match row {
            Some(record) if record.version == expected_version => {
                record.version += 1;
                record.data = data;
                Ok(record.clone())
            }
            stale => {
                debug!(
                    table,
                    id,
                    expected_version,
                    found = stale.map(|r| r.version),
                    "conditional update matched zero rows"
                );
                Err(OptimisticLockError {
                    table: table.into(),
                    id: id.into(),
                    expected_version,
                }
                .into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn update_increments_version() {
        let store = MemoryStore::new();
        let rec = store
            .insert("extractions", "job-1", json!({"status": "pending"}))
            .await
            .unwrap();
        assert_eq!(rec.version, 1);

        let rec = store
            .update("extractions", "job-1", 1, json!({"status": "done"}))
            .await
            .unwrap();
        assert_eq!(rec.version, 2);
        assert_eq!(rec.data["status"], "done");
    }

    #[tokio::test]
    async fn stale_version_conflicts_and_mutates_nothing() {
        let store = MemoryStore::new();
        store
            .insert("extractions", "job-1", json!({"status": "pending"}))
            .await
            .unwrap();
        store
            .update("extractions", "job-1", 1, json!({"status": "processing"}))
            .await
            .unwrap();

        // A second writer still holding version 1
        let err = store
            .update("extractions", "job-1", 1, json!({"status": "failed"}))
            .await
            .unwrap_err();
        match err {
            StoreError::Conflict(conflict) => {
                assert_eq!(conflict.table, "extractions");
                assert_eq!(conflict.id, "job-1");
                assert_eq!(conflict.expected_version, 1);
            }
            other => panic!("expected conflict, got {other}"),
        }

        let rec = store.get("extractions", "job-1").await.unwrap();
        assert_eq!(rec.version, 2);
        assert_eq!(rec.data["status"], "processing");
    }

    #[tokio::test]
    async fn update_of_missing_row_is_a_conflict() {
        let store = MemoryStore::new();
        let err = store
            .update("extractions", "ghost", 1, json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn double_insert_is_rejected() {
        let store = MemoryStore::new();
        store.insert("conversions", "c-1", json!({})).await.unwrap();
        let err = store.insert("conversions", "c-1", json!({})).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }
}
