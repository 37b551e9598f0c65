//! # block-subscribe
//!
//! The block ingestion pipeline. Subscribes to the chain node's three broker
//! topics, reassembles announcements into well-formed blocks, and delivers
//! them to the consumer strictly in block-number order with no gaps and no
//! duplicates.
//!
//! ## Flow
//!
//! ```text
//! ApplyTrx ───→ staging buffer ──┐
//! AcceptBlock ─→ assembler ──────┴─→ duplicate filter ─→ delivery queue ─→ notifier ─→ BlockSink
//!                                                  └─→ holdback ──┐ (irreversible-only mode)
//! CommitBlock ─→ watermark ────────────────────────────────────────┘
//! ```
//!
//! ## Error Policy
//!
//! Fail fast: malformed broker payloads, a closed broker connection, and
//! consumer failures are all fatal. The service returns the error to its
//! supervisor instead of limping on with possibly corrupted buffers; recovery
//! is a process restart plus the broker's durable replay window.

pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use config::SubscribeConfig;
pub use error::{SubscribeError, SubscribeResult};
pub use ports::BlockSink;
pub use service::BlockSubscribeService;
