// # Memory Record Store
//
// In-memory implementation of RecordStore.
//
// ## Purpose
//
// Provides a fast store that doesn't persist across restarts. Useful for
// tests and demos, and as the reference for how a store pages and batches.
//
// ## Reachability
//
// The store can be switched "unreachable" to simulate a signed-out account:
// every call then fails with `Error::Unavailable` and `account_available()`
// reports `false`.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::config::StoreConfig;
use crate::contact::RecordId;
use crate::record::RemoteRecord;
use crate::traits::{QueryPage, QueryRequest, RecordStore, RecordStoreFactory};
use crate::Error;

/// In-memory record store implementation
///
/// Records live in a map protected by a RwLock. Clones share the same
/// records, so a test can keep a handle while the engine owns another.
///
/// # Example
///
/// ```rust,no_run
/// use contacts_core::record::{RemoteRecord, RECORD_TYPE};
/// use contacts_core::store::MemoryRecordStore;
/// use contacts_core::traits::RecordStore;
/// use contacts_core::RecordId;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryRecordStore::new();
///
///     store.save(RemoteRecord::new(RECORD_TYPE, RecordId::new())).await?;
///     assert_eq!(store.len().await, 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryRecordStore {
    inner: Arc<RwLock<BTreeMap<RecordId, RemoteRecord>>>,
    reachable: Arc<AtomicBool>,
}

impl MemoryRecordStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(BTreeMap::new())),
            reachable: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Create a store pre-populated with records
    pub fn with_records(records: impl IntoIterator<Item = RemoteRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();

        Self {
            inner: Arc::new(RwLock::new(map)),
            reachable: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Get a record by id
    pub async fn get(&self, id: &RecordId) -> Option<RemoteRecord> {
        self.inner.read().await.get(id).cloned()
    }

    /// Clear all records from the store
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    /// Make the store reachable or unreachable
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    fn ensure_reachable(&self) -> Result<(), Error> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::unavailable("memory store is unreachable"))
        }
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn save(&self, mut record: RemoteRecord) -> Result<RemoteRecord, Error> {
        self.ensure_reachable()?;

        record.modified_at = Some(Utc::now());
        let mut guard = self.inner.write().await;
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryPage, Error> {
        self.ensure_reachable()?;

        let guard = self.inner.read().await;
        super::page_of(&guard, request)
    }

    async fn modify(&self, saves: Vec<RemoteRecord>, deletes: Vec<RecordId>) -> Result<(), Error> {
        self.ensure_reachable()?;

        let mut guard = self.inner.write().await;
        super::apply_batch(&mut guard, saves, deletes)
    }

    async fn account_available(&self) -> Result<bool, Error> {
        Ok(self.reachable.load(Ordering::SeqCst))
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for `StoreConfig::Memory`
#[derive(Debug, Default)]
pub struct MemoryRecordStoreFactory;

#[async_trait]
impl RecordStoreFactory for MemoryRecordStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Box<dyn RecordStore>, Error> {
        match config {
            StoreConfig::Memory => Ok(Box::new(MemoryRecordStore::new())),
            other => Err(Error::config(format!(
                "Memory store factory cannot build a '{}' store",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RECORD_TYPE;

    fn record(id: &str) -> RemoteRecord {
        RemoteRecord::new(RECORD_TYPE, RecordId::from_name(id)).with_field("firstName", id)
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryRecordStore::new();

        // Initially empty
        assert!(store.is_empty().await);

        // Save echoes the stored record
        let echo = store.save(record("a")).await.unwrap();
        assert_eq!(echo.id.as_str(), "a");
        assert!(echo.modified_at.is_some());
        assert_eq!(store.len().await, 1);

        // Delete
        store
            .modify(Vec::new(), vec![RecordId::from_name("a")])
            .await
            .unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_store_replaces_on_modify() {
        let store = MemoryRecordStore::with_records(vec![record("a")]);

        let replacement = record("a").with_field("firstName", "changed");
        store.modify(vec![replacement], Vec::new()).await.unwrap();

        let stored = store.get(&RecordId::from_name("a")).await.unwrap();
        assert_eq!(stored.string_field("firstName"), Some("changed"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_store_query_pages() {
        let store = MemoryRecordStore::with_records((0..5).map(|i| record(&format!("r{}", i))));

        let first = store.query(&QueryRequest::start(RECORD_TYPE, 3)).await.unwrap();
        assert_eq!(first.records.len(), 3);

        let cursor = first.cursor.unwrap();
        let second = store
            .query(&QueryRequest::resume(cursor, 3))
            .await
            .unwrap();
        assert_eq!(second.records.len(), 2);
        assert!(second.is_last());
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_every_call() {
        let store = MemoryRecordStore::new();
        store.set_reachable(false);

        assert!(matches!(
            store.save(record("a")).await,
            Err(Error::Unavailable(_))
        ));
        assert!(
            store
                .query(&QueryRequest::start(RECORD_TYPE, 10))
                .await
                .is_err()
        );
        assert!(!store.account_available().await.unwrap());

        store.set_reachable(true);
        assert!(store.account_available().await.unwrap());
    }

    #[tokio::test]
    async fn test_factory_builds_memory_store() {
        let store = MemoryRecordStoreFactory
            .create(&StoreConfig::Memory)
            .await
            .unwrap();
        assert_eq!(store.store_name(), "memory");

        let wrong = StoreConfig::File {
            path: "x.json".to_string(),
        };
        assert!(MemoryRecordStoreFactory.create(&wrong).await.is_err());
    }
}
