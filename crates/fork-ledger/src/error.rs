//! Ledger errors.
//!
//! Everything surfaced through [`LedgerError`] is fatal to the consumer's
//! processing: a diverged ledger or a failed undo means consumer state can
//! no longer be trusted. Recoverable conditions (irreversibility-pruning
//! failures, `register_changes` outside an open block) are logged where
//! they happen and never become errors.

use crate::ports::{EntityError, StoreError};
use thiserror::Error;

/// Errors from ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A second block was opened while one was still being processed.
    /// Programming error in the consumer; reported, never queued.
    #[error("Parallel block processing attempted: block {open} is open, got block {requested}")]
    BlockAlreadyOpen {
        /// Block currently open.
        open: u64,
        /// Block the caller tried to open.
        requested: u64,
    },

    /// The consumer's block handler failed; the record stays unfinalized
    /// for the crash-recovery scan.
    #[error("Block handler failed for block {block_num}")]
    Handler {
        /// Block being processed.
        block_num: u64,
        /// Consumer-reported cause.
        #[source]
        source: anyhow::Error,
    },

    /// `revert` found no record at the requested base: the ledger and the
    /// chain have diverged beyond recoverable state. Nothing was deleted.
    #[error("Base block {base} not found in the fork ledger")]
    BaseBlockMissing {
        /// Requested revert base.
        base: u64,
    },

    /// The recovery scan found no records at all.
    #[error("Fork ledger is empty, nothing to recover from")]
    EmptyLedger,

    /// The recovery scan found no finalized record within its window.
    #[error("No finalized anchor found within the recovery scan window")]
    NoFinalizedAnchor,

    /// An undo entry references a collection the consumer's resolver does
    /// not know.
    #[error("No entity accessor registered for collection {collection}")]
    UnknownCollection {
        /// The unresolvable collection name.
        collection: String,
    },

    /// The record store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An entity gateway failed while applying an undo entry.
    #[error(transparent)]
    Entity(#[from] EntityError),
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
