// Library exports for the binary and integration tests

pub mod admin_api;
pub mod capture;
pub mod config;
pub mod har;
pub mod instance;
pub mod proxy;
pub mod recorder;
pub mod rewrite;
