//! Runtime configuration.

use block_subscribe::SubscribeConfig;
use std::time::Duration;
use tracing::warn;

/// Broker transport settings.
#[derive(Clone, Debug)]
pub struct BrokerConfig {
    /// How long the broker retains messages for replay. Must cover the
    /// pipeline's replay window.
    pub retention_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            retention_ms: shared_bus::DEFAULT_RETENTION_MS,
        }
    }
}

/// Top-level node configuration.
#[derive(Clone, Debug, Default)]
pub struct NodeConfig {
    /// Block ingestion pipeline settings.
    pub subscribe: SubscribeConfig,
    /// Broker transport settings.
    pub broker: BrokerConfig,
}

/// Load configuration from the environment.
///
/// Every setting has a default; unparsable values are warned about and
/// ignored rather than aborting startup.
pub fn load_config() -> NodeConfig {
    let mut config = NodeConfig::default();

    if let Some(n) = env_u64("CF_START_FROM_BLOCK") {
        config.subscribe.start_from_block = n;
    }
    if let Some(flag) = env_bool("CF_ONLY_IRREVERSIBLE") {
        config.subscribe.only_irreversible = flag;
    }
    if let Some(ms) = env_u64("CF_REPLAY_TIME_DELTA_MS") {
        config.subscribe.replay_time_delta = Duration::from_millis(ms);
    }
    if let Some(ms) = env_u64("CF_SWEEP_INTERVAL_MS") {
        config.subscribe.sweep_interval = Duration::from_millis(ms);
    }
    if let Some(n) = env_u64("CF_RETENTION_WINDOW") {
        config.subscribe.retention_window = n;
    }
    if let Some(ms) = env_u64("CF_BROKER_RETENTION_MS") {
        config.broker.retention_ms = ms;
    }

    config
}

fn env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = %raw, "Ignoring unparsable numeric setting");
            None
        }
    }
}

fn env_bool(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => {
            warn!(var = name, value = %raw, "Ignoring unparsable boolean setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pipeline_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.subscribe.start_from_block, 0);
        assert!(!config.subscribe.only_irreversible);
        assert_eq!(config.subscribe.replay_time_delta, Duration::from_secs(600));
        assert_eq!(config.subscribe.sweep_interval, Duration::from_secs(600));
        assert_eq!(config.subscribe.retention_window, 1000);
        assert_eq!(config.broker.retention_ms, shared_bus::DEFAULT_RETENTION_MS);
    }
}
