//! Offloader configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the offload orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffloadConfig {
    /// Queue parking-mode footage in addition to driving footage.
    /// When false, parking entries are claimed by the disabled bucket and
    /// dropped for the cycle (visible in the bucket tallies).
    #[serde(default)]
    pub include_parking: bool,

    /// Heartbeat latency above this aborts the build phase without touching
    /// the catalog; transfers over a degraded link are worse than waiting.
    #[serde(default = "default_latency_threshold")]
    pub latency_threshold_ms: u64,

    /// How many rebuild-after-failure attempts a single cycle may make
    /// before giving the item error back to the caller.
    #[serde(default = "default_max_rebuilds")]
    pub max_rebuilds_per_cycle: usize,

    /// Number of queue entries exposed in status previews.
    #[serde(default = "default_queue_preview_len")]
    pub queue_preview_len: usize,

    /// Delay between successful offload cycles (outer supervisory loop).
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,

    /// Delay before retrying after a retryable build failure.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,

    /// Delay before retrying after the device went fatally offline.
    #[serde(default = "default_offline_backoff")]
    pub offline_backoff_secs: u64,
}

fn default_latency_threshold() -> u64 {
    200
}

fn default_max_rebuilds() -> usize {
    3
}

fn default_queue_preview_len() -> usize {
    10
}

fn default_cycle_interval() -> u64 {
    300
}

fn default_retry_backoff() -> u64 {
    60
}

fn default_offline_backoff() -> u64 {
    900
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            include_parking: false,
            latency_threshold_ms: default_latency_threshold(),
            max_rebuilds_per_cycle: default_max_rebuilds(),
            queue_preview_len: default_queue_preview_len(),
            cycle_interval_secs: default_cycle_interval(),
            retry_backoff_secs: default_retry_backoff(),
            offline_backoff_secs: default_offline_backoff(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OffloadConfig::default();
        assert!(!config.include_parking);
        assert_eq!(config.latency_threshold_ms, 200);
        assert_eq!(config.max_rebuilds_per_cycle, 3);
        assert_eq!(config.queue_preview_len, 10);
        assert_eq!(config.cycle_interval_secs, 300);
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: OffloadConfig = toml::from_str("include_parking = true").unwrap();
        assert!(config.include_parking);
        assert_eq!(config.latency_threshold_ms, 200);
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
            include_parking = true
            latency_threshold_ms = 150
            max_rebuilds_per_cycle = 1
            queue_preview_len = 5
            cycle_interval_secs = 60
            retry_backoff_secs = 10
            offline_backoff_secs = 120
        "#;
        let config: OffloadConfig = toml::from_str(toml).unwrap();
        assert!(config.include_parking);
        assert_eq!(config.latency_threshold_ms, 150);
        assert_eq!(config.max_rebuilds_per_cycle, 1);
        assert_eq!(config.queue_preview_len, 5);
        assert_eq!(config.offline_backoff_secs, 120);
    }
}
