//! Broker wire messages.
//!
//! The chain node publishes three topics: `ApplyTrx` (one message per applied
//! transaction), `AcceptBlock` (one per accepted block, referencing its
//! transactions by id), and `CommitBlock` (the irreversibility watermark).
//! Payloads are JSON; field names follow the node's own serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A transaction announced on the `ApplyTrx` topic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionApply {
    /// Transaction id, unique within the replay window.
    pub id: String,
    /// Actions carried by the transaction.
    #[serde(default)]
    pub actions: Vec<TrxAction>,
}

/// One action inside a transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrxAction {
    /// Contract account the action targets.
    #[serde(default)]
    pub code: Option<String>,
    /// Action name on that contract.
    #[serde(default)]
    pub action: Option<String>,
    /// Serialized action payload. Structural actions carry an empty string.
    #[serde(default)]
    pub data: String,
}

impl TrxAction {
    /// Whether this action carries no payload data.
    ///
    /// The staging buffer keeps only structural actions; payload-bearing
    /// actions are stripped before a transaction is staged.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        self.data.is_empty()
    }
}

/// A block announced on the `AcceptBlock` topic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockAccept {
    /// Whether the node validated this block. Unvalidated blocks are ignored.
    #[serde(default)]
    pub validated: bool,
    /// Chain block id.
    pub id: String,
    /// Block number, strictly increasing across accept messages.
    pub block_num: u64,
    /// Block production time.
    pub block_time: DateTime<Utc>,
    /// Transactions referenced by the block, in block order.
    #[serde(default)]
    pub trxs: Vec<TrxRef>,
}

/// Reference to a transaction by id inside an accept message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrxRef {
    /// Transaction id, matching a prior `ApplyTrx` announcement.
    pub id: String,
}

/// The irreversibility watermark, published on the `CommitBlock` topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCommit {
    /// Highest block number the chain guarantees will never be reorganized.
    pub block_num: u64,
}
