//! In-memory adapters.
//!
//! Back the record-store and entity ports with plain maps. Used by the node
//! runtime wiring and throughout the test suites; a durable deployment
//! implements the same ports over its document store.

use crate::domain::{ForkRecord, UndoItem};
use crate::ports::{EntityError, EntityGateway, EntityResolver, ForkRecordStore, StoreError};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Fork records in a BTreeMap keyed by block number.
#[derive(Default)]
pub struct InMemoryForkStore {
    records: RwLock<BTreeMap<u64, ForkRecord>>,
}

impl InMemoryForkStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty_sync(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Whether a record exists at `block_num`.
    #[must_use]
    pub fn contains(&self, block_num: u64) -> bool {
        self.records.read().contains_key(&block_num)
    }

    /// Snapshot of the record at `block_num`.
    #[must_use]
    pub fn record(&self, block_num: u64) -> Option<ForkRecord> {
        self.records.read().get(&block_num).cloned()
    }
}

#[async_trait]
impl ForkRecordStore for InMemoryForkStore {
    async fn insert(&self, record: ForkRecord) -> Result<(), StoreError> {
        self.records.write().insert(record.block_num, record);
        Ok(())
    }

    async fn mark_finalized(&self, block_num: u64) -> Result<(), StoreError> {
        let mut records = self.records.write();
        match records.get_mut(&block_num) {
            Some(record) => {
                record.finalized = Some(true);
                Ok(())
            }
            None => Err(StoreError {
                reason: format!("no record at block {block_num}"),
            }),
        }
    }

    async fn push_to_newest(&self, item: UndoItem) -> Result<bool, StoreError> {
        let mut records = self.records.write();
        match records.values_mut().next_back() {
            Some(record) => {
                record.stack.push(item);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_from(&self, base_block_num: u64) -> Result<Vec<ForkRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .range(base_block_num..)
            .rev()
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn find_newest(&self, limit: usize) -> Result<Vec<ForkRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .values()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete(&self, block_num: u64) -> Result<(), StoreError> {
        self.records.write().remove(&block_num);
        Ok(())
    }

    async fn delete_above(&self, base_block_num: u64) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let _ = records.split_off(&base_block_num.saturating_add(1));
        Ok(())
    }

    async fn delete_below(&self, threshold: u64) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let keep = records.split_off(&threshold);
        *records = keep;
        Ok(())
    }

    async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.records.read().is_empty())
    }
}

/// One entity collection as an id → document map.
#[derive(Default)]
pub struct InMemoryEntityStore {
    documents: RwLock<HashMap<String, Value>>,
}

impl InMemoryEntityStore {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the document at `entity_id`.
    #[must_use]
    pub fn document(&self, entity_id: &str) -> Option<Value> {
        self.documents.read().get(entity_id).cloned()
    }

    /// Number of documents in the collection.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl EntityGateway for InMemoryEntityStore {
    async fn create(&self, entity_id: &str, document: Value) -> Result<(), EntityError> {
        let mut documents = self.documents.write();
        if documents.contains_key(entity_id) {
            return Err(EntityError::AlreadyExists {
                entity_id: entity_id.to_owned(),
            });
        }
        documents.insert(entity_id.to_owned(), document);
        Ok(())
    }

    async fn update(&self, entity_id: &str, document: Value) -> Result<(), EntityError> {
        // Overwrite semantics; an absent entity is created, matching the
        // snapshot-restore shape of undo.
        self.documents
            .write()
            .insert(entity_id.to_owned(), document);
        Ok(())
    }

    async fn remove(&self, entity_id: &str) -> Result<(), EntityError> {
        self.documents.write().remove(entity_id);
        Ok(())
    }
}

/// Collection registry handing out [`InMemoryEntityStore`] accessors.
#[derive(Default)]
pub struct InMemoryEntityRegistry {
    collections: RwLock<HashMap<String, Arc<InMemoryEntityStore>>>,
}

impl InMemoryEntityRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the named collection.
    pub fn collection(&self, name: &str) -> Arc<InMemoryEntityStore> {
        let mut collections = self.collections.write();
        Arc::clone(
            collections
                .entry(name.to_owned())
                .or_insert_with(|| Arc::new(InMemoryEntityStore::new())),
        )
    }
}

impl EntityResolver for InMemoryEntityRegistry {
    fn resolve(&self, collection: &str) -> Option<Arc<dyn EntityGateway>> {
        self.collections
            .read()
            .get(collection)
            .map(|store| Arc::clone(store) as Arc<dyn EntityGateway>)
    }
}
