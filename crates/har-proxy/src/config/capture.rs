//! Capture and recorder configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Body capture settings for the interceptor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureConfig {
    /// Duplicate request/response bodies into the log
    #[serde(default = "default_capture_content")]
    pub capture_content: bool,
    /// Upper bound of a captured body copy, in bytes. Forwarded bytes are never truncated.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_capture_content() -> bool {
    true
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capture_content: default_capture_content(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Transaction recorder settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecorderConfig {
    /// Capacity of each instance's capture channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// How often a waiting drain re-checks its deadline
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// A drain taking longer than this logs a warning (and keeps waiting)
    #[serde(default = "default_warn_after_secs")]
    pub warn_after_secs: u64,
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_warn_after_secs() -> u64 {
    10
}

impl RecorderConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn warn_after(&self) -> Duration {
        Duration::from_secs(self.warn_after_secs)
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
            warn_after_secs: default_warn_after_secs(),
        }
    }
}
