//! Domain entities produced by the ingestion pipeline.

use crate::messages::TransactionApply;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fully assembled block, ready for delivery to the consumer.
///
/// `transactions` preserves the block's own transaction order. An entry is
/// `None` when the staging buffer had no transaction for the referenced id;
/// outside of the bootstrap race on the very first block this indicates
/// upstream data loss and is logged, not dropped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssembledBlock {
    /// Chain block id.
    pub id: String,
    /// Block number.
    pub block_num: u64,
    /// Block production time.
    pub block_time: DateTime<Utc>,
    /// Broker sequence of the accept message that produced this block.
    pub sequence: u64,
    /// Transactions in block order; `None` marks a staging miss.
    pub transactions: Vec<Option<TransactionApply>>,
}

/// Resume position reported by the crash-recovery scan.
///
/// Identifies the last finalized block so the pipeline can skip everything
/// at or below it after a restart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeCursor {
    /// Number of the last finalized block.
    pub block_num: u64,
    /// Broker sequence recorded for that block.
    pub sequence: u64,
}
