//! Forward proxy engine.
//!
//! # Module Structure
//!
//! - `listener` - StoppableListener and the per-connection serve loop
//! - `handler` - ForwardingEngine: CONNECT tunnels and absolute-form dispatch
//! - `hooks` - pre-forward and round-trip hook traits
//! - `forwarding` - Transport (upstream round trips) and response helpers
//! - `client` - HTTP client creation and configuration
//! - `upstream` - upstream proxy discovery from the environment
//! - `headers` - hop-by-hop header stripping

mod client;
mod forwarding;
mod handler;
mod headers;
mod hooks;
mod listener;
mod upstream;


pub use forwarding::{empty, error_response, full, ForwardError, ProxyBody, Transport};
pub use handler::ForwardingEngine;
pub use hooks::{ForwardHooks, Passthrough, PreForward, RoundTripHook};
pub use listener::{ServeContext, ServeHandle, StoppableListener};
pub use upstream::{UpstreamEndpoint, UpstreamProxy};
