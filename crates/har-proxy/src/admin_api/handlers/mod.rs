//! Route handlers for the control-plane API.

pub mod har;
pub mod hosts;
pub mod proxies;
pub mod system;
