//! Instance lifecycle state and registry errors.

use crate::rewrite::{HostRule, RewriteError};
use serde::Serialize;
use std::fmt;

/// Lifecycle of a proxy instance. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    /// Listener bound, capture channel open, recorder running
    Created,
    /// Accepting connections
    Running,
    /// No longer accepting; in-flight transactions still completing
    Draining,
    /// Serving task exited, channel closed, recorder exited
    Stopped,
}

impl InstanceState {
    pub fn is_live(self) -> bool {
        matches!(self, InstanceState::Created | InstanceState::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InstanceState::Created => "created",
            InstanceState::Running => "running",
            InstanceState::Draining => "draining",
            InstanceState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listing view of an instance
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSummary {
    pub port: u16,
    pub state: InstanceState,
    pub entries: usize,
    pub host_rules: Vec<HostRule>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Port {0} is already in use")]
    PortInUse(u16),
    #[error("No proxy for port [{0}]")]
    NotFound(u16),
    #[error("Failed to bind port {0}: {1}")]
    BindError(u16, String),
    #[error("Invalid host rules: {0}")]
    InvalidHostRules(#[from] RewriteError),
}
