//! Pipeline configuration.

use std::time::Duration;

/// Block ingestion configuration.
#[derive(Clone, Debug)]
pub struct SubscribeConfig {
    /// Blocks below this number are dropped by the notifier with a log line.
    pub start_from_block: u64,
    /// Hold assembled blocks back until the irreversibility watermark passes
    /// them, instead of delivering immediately.
    pub only_irreversible: bool,
    /// How far back each broker subscription replays on (re)connect.
    pub replay_time_delta: Duration,
    /// How often the duplicate filter and staging buffer are swept.
    pub sweep_interval: Duration,
    /// Sweep retention, in blocks: entries older than
    /// `current_block_num - retention_window` are pruned.
    pub retention_window: u64,
}

impl Default for SubscribeConfig {
    fn default() -> Self {
        Self {
            start_from_block: 0,
            only_irreversible: false,
            replay_time_delta: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(600),
            retention_window: 1000,
        }
    }
}
