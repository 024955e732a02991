//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Interval between state machine ticks
    #[serde(rename = "tick-ms")]
    pub tick_ms: u64,

    /// Channel buffer size for coordinator requests
    #[serde(rename = "inbox-buffer")]
    pub inbox_buffer: usize,

    /// Broadcast capacity for state change notifications
    #[serde(rename = "state-buffer")]
    pub state_buffer: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            tick_ms: 250,
            inbox_buffer: 256,
            state_buffer: 64,
        }
    }
}

impl CoordinatorConfig {
    /// Get the tick interval as a Duration
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}
