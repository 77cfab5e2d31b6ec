//! HAR log handlers.

use crate::admin_api::types::*;
use crate::instance::ProxyRegistry;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;
use tracing::debug;

/// PUT /proxy/:port/har - Drain, return the log and reset it
pub async fn handle_drain(port: u16, registry: Arc<ProxyRegistry>) -> Response<Full<Bytes>> {
    match registry.drain_and_take_har(port).await {
        Ok(har) => {
            debug!(
                "Returning {} entries for proxy on port {}",
                har.entries().len(),
                port
            );
            json_response(StatusCode::OK, &har)
        }
        Err(e) => proxy_error_response(&e),
    }
}

/// GET /proxy/:port/har - Current log, without draining or resetting
pub fn handle_get(port: u16, registry: Arc<ProxyRegistry>) -> Response<Full<Bytes>> {
    match registry.har(port) {
        Ok(har) => json_response(StatusCode::OK, &har),
        Err(e) => proxy_error_response(&e),
    }
}
