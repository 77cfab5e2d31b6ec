//! Proxy instance lifecycle management.
//!
//! This module provides:
//! - `ProxyRegistry`: port → instance map; create, stop, delete
//! - `ProxyInstance`: one running proxy with its own port, host rules and log
//! - `InstanceState`: Created → Running → Draining → Stopped
//!
//! ## Module Structure
//!
//! - `types`: lifecycle state, summaries and errors
//! - `core`: ProxyInstance and its stop handshake
//! - `registry`: ProxyRegistry

mod core;
mod registry;
mod types;

#[cfg(test)]
mod tests;

pub use core::ProxyInstance;
pub use registry::{InstanceSettings, ProxyRegistry};
pub use types::{InstanceState, InstanceSummary, ProxyError};
