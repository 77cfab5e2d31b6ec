//! Configuration types for har-proxy.

mod capture;
mod listen;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use capture::{CaptureConfig, RecorderConfig};
pub use listen::{AdminConfig, ConnectionPoolConfig, ProxyConfig};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.recorder.channel_capacity == 0 {
            anyhow::bail!("recorder.channel_capacity must be greater than zero");
        }
        if self.recorder.poll_interval_ms == 0 {
            anyhow::bail!("recorder.poll_interval_ms must be greater than zero");
        }
        if self.proxy.bind_host.is_empty() {
            anyhow::bail!("proxy.bind_host must not be empty");
        }
        Ok(())
    }
}
