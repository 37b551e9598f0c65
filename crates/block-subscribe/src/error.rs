//! Pipeline errors.

use shared_bus::Topic;
use thiserror::Error;

/// Errors surfaced by the ingestion pipeline.
///
/// Every variant here is unrecoverable: partial corruption of the staging
/// buffer, duplicate filter, or queues is judged worse than a restart, so the
/// pipeline reports and stops. Recoverable conditions (sweep hiccups, skipped
/// outdated blocks) are logged in place and never reach this type.
#[derive(Debug, Error)]
pub enum SubscribeError {
    /// A broker payload failed to parse. Malformed broker data is an
    /// integrity violation, not a retryable error.
    #[error("Malformed broker message on topic {topic}")]
    MalformedMessage {
        /// Topic the payload arrived on.
        topic: Topic,
        /// Underlying parse failure.
        #[source]
        source: serde_json::Error,
    },

    /// The broker transport closed. No in-process reconnect is attempted;
    /// the external supervisor restarts the process, which resumes via the
    /// durable subscription's replay window.
    #[error("Broker connection closed")]
    ConnectionClosed,

    /// The consumer failed while handling a delivered block.
    #[error("Consumer failed handling block {block_num}")]
    ConsumerFailure {
        /// Number of the block being handled.
        block_num: u64,
        /// Consumer-reported cause.
        #[source]
        source: anyhow::Error,
    },

    /// The notifier task ended without being asked to.
    #[error("Notifier task aborted")]
    NotifierAborted,
}

impl SubscribeError {
    /// Whether the supervisor must terminate the process.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            SubscribeError::MalformedMessage { .. }
            | SubscribeError::ConnectionClosed
            | SubscribeError::ConsumerFailure { .. }
            | SubscribeError::NotifierAborted => true,
        }
    }
}

/// Result alias for pipeline operations.
pub type SubscribeResult<T> = Result<T, SubscribeError>;
