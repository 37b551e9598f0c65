//! # Broker Boundary
//!
//! The pub/sub transport the ingestion pipeline consumes blocks from.
//!
//! The production transport is an external, durable message broker; this
//! crate specifies it at its interface boundary only:
//!
//! - [`BlockBroker`]: subscribe to a set of [`Topic`]s with a bounded
//!   [`ReplayWindow`]
//! - [`BrokerSubscription`]: ordered, at-least-once message delivery;
//!   `recv()` returning `None` means the transport closed, which callers
//!   treat as fatal
//! - [`InMemoryBroker`]: in-process implementation with a retained,
//!   time-stamped per-topic log that honors replay windows; used by the node
//!   runtime wiring and the test suite
//!
//! ## Delivery Contract
//!
//! Messages are delivered in publish order, across all topics a subscription
//! covers. Replay on subscribe may redeliver messages already handled before
//! a restart; consumers are expected to deduplicate.

pub mod broker;
pub mod memory;
pub mod subscription;
pub mod topic;

pub use broker::{BlockBroker, BrokerError};
pub use memory::InMemoryBroker;
pub use subscription::BrokerSubscription;
pub use topic::{BrokerMessage, ReplayWindow, Topic};

/// Default retained-log span for the in-memory broker, one hour.
///
/// Must cover the largest replay window any subscriber asks for.
pub const DEFAULT_RETENTION_MS: u64 = 60 * 60 * 1000;
