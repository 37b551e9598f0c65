//! Ledger domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::AssembledBlock;

/// The kind of mutation an undo entry reverses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndoKind {
    /// Entity was created; undo deletes it.
    Create,
    /// Entity was updated; undo overwrites it with the prior snapshot.
    Update,
    /// Entity was removed; undo recreates it from the prior snapshot.
    Remove,
}

/// One reversible effect recorded against an open block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UndoItem {
    /// Mutation kind.
    pub kind: UndoKind,
    /// Logical collection name, resolvable through the consumer's
    /// entity resolver.
    pub collection: String,
    /// Entity id within the collection.
    pub entity_id: String,
    /// Prior document snapshot. `None` for creates (undo needs no data);
    /// the full pre-mutation document for updates and removes, captured by
    /// the caller before mutating.
    pub prior: Option<Value>,
}

/// A mutation reported by the consumer while a block is open.
///
/// Passed through the collection's revert hook (if any) to shape the
/// recorded [`UndoItem`]; by default it converts verbatim.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeSet {
    /// Mutation kind.
    pub kind: UndoKind,
    /// Logical collection name.
    pub collection: String,
    /// Entity id within the collection.
    pub entity_id: String,
    /// Pre-mutation snapshot, per the [`UndoItem::prior`] policy.
    pub prior: Option<Value>,
}

impl ChangeSet {
    /// The default undo entry for this change.
    #[must_use]
    pub fn into_undo_item(self) -> UndoItem {
        UndoItem {
            kind: self.kind,
            collection: self.collection,
            entity_id: self.entity_id,
            prior: self.prior,
        }
    }
}

/// Per-block undo-log record, one per processed block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForkRecord {
    /// Block number this record belongs to.
    pub block_num: u64,
    /// Block production time.
    pub block_time: DateTime<Utc>,
    /// Broker sequence of the block's accept message.
    pub sequence: u64,
    /// `Some(false)` while the block's handler is mid-flight or after an
    /// abnormal exit, `Some(true)` after commit. `None` marks legacy records
    /// written before the flag existed; the recovery scan has a dedicated
    /// branch for them.
    #[serde(default)]
    pub finalized: Option<bool>,
    /// Undo entries in registration order; replayed back-to-front on revert.
    #[serde(default)]
    pub stack: Vec<UndoItem>,
}

/// The block identity `wrap_block` records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockRef {
    /// Block number.
    pub block_num: u64,
    /// Block production time.
    pub block_time: DateTime<Utc>,
    /// Broker sequence of the accept message.
    pub sequence: u64,
}

impl From<&AssembledBlock> for BlockRef {
    fn from(block: &AssembledBlock) -> Self {
        Self {
            block_num: block.block_num,
            block_time: block.block_time,
            sequence: block.sequence,
        }
    }
}
