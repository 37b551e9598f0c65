//! Driven ports: record persistence, entity access, and revert hooks.

use crate::domain::{ChangeSet, ForkRecord, UndoItem};
use crate::error::LedgerResult;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Record store failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Fork record store failure: {reason}")]
pub struct StoreError {
    /// Backend-reported cause.
    pub reason: String,
}

/// Entity gateway failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EntityError {
    /// Create hit an entity that already exists.
    #[error("Entity {entity_id} already exists")]
    AlreadyExists {
        /// Conflicting entity id.
        entity_id: String,
    },
    /// Backend failure.
    #[error("Entity store failure: {reason}")]
    Backend {
        /// Backend-reported cause.
        reason: String,
    },
}

/// Durable persistence for fork records, keyed by block number.
///
/// Query set required of the backing store: descending range scans, a push
/// onto the newest record's stack, point and range deletes, and a threshold
/// bulk delete.
#[async_trait]
pub trait ForkRecordStore: Send + Sync {
    /// Insert a new record. At most one record may exist per block number.
    async fn insert(&self, record: ForkRecord) -> Result<(), StoreError>;

    /// Set the `finalized` flag on the record at `block_num`.
    async fn mark_finalized(&self, block_num: u64) -> Result<(), StoreError>;

    /// Append an undo entry to the newest record's stack.
    ///
    /// Returns `false` when the ledger holds no records (the best-effort
    /// fallback path of `register_changes`).
    async fn push_to_newest(&self, item: UndoItem) -> Result<bool, StoreError>;

    /// Records with `block_num >= base_block_num`, ordered descending.
    async fn find_from(&self, base_block_num: u64) -> Result<Vec<ForkRecord>, StoreError>;

    /// The newest `limit` records, ordered descending.
    async fn find_newest(&self, limit: usize) -> Result<Vec<ForkRecord>, StoreError>;

    /// Delete the record at `block_num` if present.
    async fn delete(&self, block_num: u64) -> Result<(), StoreError>;

    /// Delete all records with `block_num > base_block_num`.
    async fn delete_above(&self, base_block_num: u64) -> Result<(), StoreError>;

    /// Delete all records with `block_num < threshold`.
    async fn delete_below(&self, threshold: u64) -> Result<(), StoreError>;

    /// Whether the ledger holds no records.
    async fn is_empty(&self) -> Result<bool, StoreError>;
}

/// Generic create/update/remove against one entity collection.
///
/// Documents are JSON values; the ledger never interprets their contents.
#[async_trait]
pub trait EntityGateway: Send + Sync {
    /// Create an entity from a snapshot.
    async fn create(&self, entity_id: &str, document: Value) -> Result<(), EntityError>;

    /// Overwrite an entity with a snapshot.
    async fn update(&self, entity_id: &str, document: Value) -> Result<(), EntityError>;

    /// Remove an entity. Removing an absent entity is not an error.
    async fn remove(&self, entity_id: &str) -> Result<(), EntityError>;
}

/// The consumer's capability for resolving collection names to accessors.
pub trait EntityResolver: Send + Sync {
    /// Resolve a logical collection name. `None` means the consumer does
    /// not know the collection, which is fatal during a revert.
    fn resolve(&self, collection: &str) -> Option<Arc<dyn EntityGateway>>;
}

/// Per-collection override of the generic undo logic.
///
/// Registered by collection tag; used when an entity's true undo semantics
/// are not a plain field overwrite.
#[async_trait]
pub trait RevertHook: Send + Sync {
    /// Shape the undo entry recorded for a change. The default records the
    /// change verbatim.
    fn prepare_undo(&self, change: &ChangeSet) -> UndoItem {
        change.clone().into_undo_item()
    }

    /// Apply an undo entry, replacing the generic create/update/remove
    /// reversal entirely.
    async fn apply_undo(&self, item: &UndoItem, resolver: &dyn EntityResolver)
        -> LedgerResult<()>;
}

/// Callback invoked after a batch of records has been reverted.
#[async_trait]
pub trait RevertObserver: Send + Sync {
    /// Observe the reverted records, newest first.
    async fn after_revert(&self, reverted: &[ForkRecord]);
}
