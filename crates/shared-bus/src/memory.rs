//! In-memory broker implementation.
//!
//! Single-process stand-in for the external durable broker. Each topic keeps
//! a retained log of recent messages so new subscriptions can replay their
//! window; the log is pruned on publish to bound memory.

use crate::broker::{BlockBroker, BrokerError};
use crate::subscription::BrokerSubscription;
use crate::topic::{BrokerMessage, ReplayWindow, Topic};
use crate::DEFAULT_RETENTION_MS;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::debug;

/// Per-topic retained log and live subscriber senders.
#[derive(Default)]
struct TopicState {
    log: VecDeque<BrokerMessage>,
    subscribers: Vec<mpsc::UnboundedSender<BrokerMessage>>,
}

/// In-memory replayable broker.
///
/// Every published message gets a globally monotonic sequence, and a
/// subscription covering several topics receives them in that order. Replay
/// on subscribe plus live delivery gives the same at-least-once semantics the
/// external broker has: a subscriber reconnecting within the retention span
/// sees its replay window again.
pub struct InMemoryBroker {
    topics: Mutex<HashMap<Topic, TopicState>>,
    sequence: AtomicU64,
    closed: AtomicBool,
    retention_ms: u64,
}

impl InMemoryBroker {
    /// Create a broker with the default retention span.
    #[must_use]
    pub fn new() -> Self {
        Self::with_retention_ms(DEFAULT_RETENTION_MS)
    }

    /// Create a broker retaining messages for `retention_ms`.
    #[must_use]
    pub fn with_retention_ms(retention_ms: u64) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            retention_ms,
        }
    }

    /// Publish a raw payload on `topic`. Returns the assigned sequence.
    pub fn publish(&self, topic: Topic, payload: Vec<u8>) -> u64 {
        let now_ms = Self::now_ms();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let message = BrokerMessage {
            topic,
            sequence,
            timestamp_ms: now_ms,
            payload,
        };

        let mut topics = self.topics.lock();
        let state = topics.entry(topic).or_default();

        Self::prune(state, now_ms, self.retention_ms);
        state.log.push_back(message.clone());

        // Dead receivers are dropped here rather than tracked separately.
        state
            .subscribers
            .retain(|sender| sender.send(message.clone()).is_ok());

        debug!(topic = %topic, sequence, receivers = state.subscribers.len(), "Message published");
        sequence
    }

    /// Serialize `payload` as JSON and publish it on `topic`.
    ///
    /// Returns the assigned sequence, or 0 if serialization failed and
    /// nothing was published.
    pub fn publish_json<T: Serialize>(&self, topic: Topic, payload: &T) -> u64 {
        match serde_json::to_vec(payload) {
            Ok(bytes) => self.publish(topic, bytes),
            Err(err) => {
                tracing::warn!(topic = %topic, error = %err, "Dropped unserializable payload");
                0
            }
        }
    }

    /// Close the transport: live subscriptions drain and then end, and new
    /// subscriptions are refused.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut topics = self.topics.lock();
        for state in topics.values_mut() {
            state.subscribers.clear();
        }
    }

    /// Number of live subscriptions on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topics
            .lock()
            .get(&topic)
            .map_or(0, |state| state.subscribers.len())
    }

    /// Number of retained messages on `topic`.
    #[must_use]
    pub fn retained_count(&self, topic: Topic) -> usize {
        self.topics
            .lock()
            .get(&topic)
            .map_or(0, |state| state.log.len())
    }

    fn prune(state: &mut TopicState, now_ms: u64, retention_ms: u64) {
        let threshold = now_ms.saturating_sub(retention_ms);
        while state
            .log
            .front()
            .is_some_and(|message| message.timestamp_ms < threshold)
        {
            state.log.pop_front();
        }
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlockBroker for InMemoryBroker {
    async fn subscribe(
        &self,
        topics: &[Topic],
        replay: ReplayWindow,
    ) -> Result<BrokerSubscription, BrokerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let replay_delta_ms = replay.delta().as_millis() as u64;
        let replay_from = Self::now_ms().saturating_sub(replay_delta_ms);

        let mut states = self.topics.lock();
        let mut retained: Vec<BrokerMessage> = Vec::new();
        for &topic in topics {
            let state = states.entry(topic).or_default();
            // A zero window means live messages only, even ones published
            // within the same millisecond as the subscribe call.
            if replay_delta_ms > 0 {
                retained.extend(
                    state
                        .log
                        .iter()
                        .filter(|message| message.timestamp_ms >= replay_from)
                        .cloned(),
                );
            }
            state.subscribers.push(sender.clone());
        }

        // Restore the original publish order across topics.
        retained.sort_by_key(|message| message.sequence);
        let replayed = retained.len();
        for message in retained {
            // Receiver is held by the caller; send cannot fail yet.
            let _ = sender.send(message);
        }

        debug!(topics = topics.len(), replayed, "Subscription opened");
        Ok(BrokerSubscription::new(topics.to_vec(), receiver))
    }
}
