//! Ports.
//!
//! The broker side is specified in `shared-bus`; this module holds the
//! consumer-facing port.

mod outbound;

pub use outbound::BlockSink;
