//! The broker port.

use crate::subscription::BrokerSubscription;
use crate::topic::{ReplayWindow, Topic};
use async_trait::async_trait;
use thiserror::Error;

/// Errors from broker operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The broker connection is closed; no new subscriptions are possible.
    ///
    /// The pipeline treats this as unrecoverable and terminates; an external
    /// supervisor restarts the process, which resumes via the durable
    /// subscription's replay window.
    #[error("Broker connection closed")]
    Closed,
}

/// Ordered, replayable pub/sub transport.
///
/// One session per process. The transport guarantees at-least-once delivery
/// in publish order across all topics a subscription covers, with bounded
/// replay from a time offset on subscribe. There is no in-process reconnect:
/// a lost connection surfaces as a closed subscription.
#[async_trait]
pub trait BlockBroker: Send + Sync {
    /// Open a durable subscription covering `topics`, replaying retained
    /// messages within `replay` of now before delivering live ones. Replayed
    /// and live messages alike arrive in their original publish order,
    /// regardless of topic.
    async fn subscribe(
        &self,
        topics: &[Topic],
        replay: ReplayWindow,
    ) -> Result<BrokerSubscription, BrokerError>;
}
