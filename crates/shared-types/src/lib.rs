//! # Shared Types Crate
//!
//! Wire messages and domain entities used across the chainfeed crates.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses a crate boundary is
//!   defined here.
//! - **No business logic**: these are plain serde-derived data carriers; all
//!   decisions about them live in `block-subscribe` and `fork-ledger`.

pub mod entities;
pub mod messages;

pub use entities::{AssembledBlock, ResumeCursor};
pub use messages::{BlockAccept, BlockCommit, TransactionApply, TrxAction, TrxRef};
