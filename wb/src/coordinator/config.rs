//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// How long a broadcast waits for every window, in milliseconds
    #[serde(rename = "aggregation-timeout-ms", default = "default_aggregation_timeout_ms")]
    pub aggregation_timeout_ms: u64,

    /// Channel buffer size for coordinator requests
    #[serde(rename = "channel-buffer", default = "default_channel_buffer")]
    pub channel_buffer: usize,
}

fn default_aggregation_timeout_ms() -> u64 {
    debug!("default_aggregation_timeout_ms: called");
    5000
}

fn default_channel_buffer() -> usize {
    debug!("default_channel_buffer: called");
    1000
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        debug!("CoordinatorConfig::default: called");
        Self {
            aggregation_timeout_ms: default_aggregation_timeout_ms(),
            channel_buffer: default_channel_buffer(),
        }
    }
}

impl CoordinatorConfig {
    /// Get the aggregation timeout as a Duration
    pub fn aggregation_timeout(&self) -> Duration {
        debug!(aggregation_timeout_ms = %self.aggregation_timeout_ms, "CoordinatorConfig::aggregation_timeout: called");
        Duration::from_millis(self.aggregation_timeout_ms)
    }
}
