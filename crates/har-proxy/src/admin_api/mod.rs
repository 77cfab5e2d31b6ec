//! Control-plane REST API for proxy instances.
//!
//! This module provides the API for:
//! - Creating, listing and deleting proxy instances
//! - Draining and reading each instance's HAR log
//! - Adding host redirection rules
//! - Health checks
//!
//! The API listens on a configurable port (default: 8080).

mod handlers;
mod router;
mod server;
mod types;

pub use router::route_request;
pub use server::AdminApiServer;
