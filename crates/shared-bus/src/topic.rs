//! Topics and the raw message envelope.

use std::fmt;
use std::time::Duration;

/// The three topics the chain node broadcasts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Individual transaction announcements.
    ApplyTrx,
    /// Accepted (validated) block announcements.
    AcceptBlock,
    /// Irreversibility watermark announcements.
    CommitBlock,
}

impl Topic {
    /// All topics, in the order the pipeline subscribes to them.
    pub const ALL: [Topic; 3] = [Topic::ApplyTrx, Topic::AcceptBlock, Topic::CommitBlock];

    /// Topic name on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::ApplyTrx => "ApplyTrx",
            Topic::AcceptBlock => "AcceptBlock",
            Topic::CommitBlock => "CommitBlock",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw broker message.
///
/// The payload is undecoded JSON; parsing (and the fatal-on-malformed policy)
/// belongs to the subscriber, not the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerMessage {
    /// Topic this message was published on.
    pub topic: Topic,
    /// Broker-assigned sequence, strictly increasing per broker.
    pub sequence: u64,
    /// Publish time, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Raw message payload.
    pub payload: Vec<u8>,
}

/// How far back a new subscription rewinds before receiving live messages.
///
/// A restart must not lose notifications published just before it, so
/// subscriptions replay the trailing window of retained messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplayWindow {
    delta: Duration,
}

impl ReplayWindow {
    /// Replay messages published within `delta` of now.
    #[must_use]
    pub fn last(delta: Duration) -> Self {
        Self { delta }
    }

    /// No replay, live messages only.
    #[must_use]
    pub fn none() -> Self {
        Self {
            delta: Duration::ZERO,
        }
    }

    /// The rewind span.
    #[must_use]
    pub fn delta(self) -> Duration {
        self.delta
    }
}
