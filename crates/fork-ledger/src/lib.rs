//! # fork-ledger
//!
//! Fork-aware mutation ledger. The consumer wraps each delivered block's
//! processing in a begin/commit frame and records one undo entry per
//! mutating operation it performs; on a chain reorganization (or on crash
//! recovery) the ledger rolls every trailing block back to a known-good base
//! by replaying those undo entries in reverse.
//!
//! ## Model
//!
//! One [`ForkRecord`] per processed block, keyed by block number, persisted
//! through the [`ForkRecordStore`] port. Each record carries a stack of
//! [`UndoItem`]s appended while the block is open. Records form a contiguous
//! suffix of chain history; irreversibility pruning keeps one record below
//! the watermark as a safety anchor.
//!
//! ## Mutual Exclusion
//!
//! At most one block is open at a time. A second `wrap_block` while one is
//! open is a programming error and is rejected rather than queued; the
//! undo-stack-per-block model is only sound with a single writer.

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use domain::{BlockRef, ChangeSet, ForkRecord, UndoItem, UndoKind};
pub use error::{LedgerError, LedgerResult};
pub use ports::{
    EntityError, EntityGateway, EntityResolver, ForkRecordStore, RevertHook, RevertObserver,
    StoreError,
};
pub use service::{ForkLedger, RECOVERY_SCAN_LIMIT};
