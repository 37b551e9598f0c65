//! Subscription handles.

use crate::topic::{BrokerMessage, Topic};
use tokio::sync::mpsc;

/// A live subscription over one or more topics.
///
/// Messages arrive in publish order across all covered topics; each message
/// carries the topic it was published on. When the transport closes, `recv`
/// returns `None` and the subscription is dead for good.
pub struct BrokerSubscription {
    topics: Vec<Topic>,
    receiver: mpsc::UnboundedReceiver<BrokerMessage>,
}

impl BrokerSubscription {
    /// Wrap a receiver fed by a broker implementation.
    #[must_use]
    pub fn new(topics: Vec<Topic>, receiver: mpsc::UnboundedReceiver<BrokerMessage>) -> Self {
        Self { topics, receiver }
    }

    /// Receive the next message.
    ///
    /// Returns `None` once the transport has closed and all buffered
    /// messages were drained.
    pub async fn recv(&mut self) -> Option<BrokerMessage> {
        self.receiver.recv().await
    }

    /// Receive without waiting. `Ok(None)` means no message is buffered.
    pub fn try_recv(&mut self) -> Result<Option<BrokerMessage>, mpsc::error::TryRecvError> {
        match self.receiver.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// The topics this subscription listens on.
    #[must_use]
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }
}
