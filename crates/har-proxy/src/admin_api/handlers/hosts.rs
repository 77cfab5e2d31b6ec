//! Host redirection rule handlers.

use crate::admin_api::types::*;
use crate::instance::ProxyRegistry;
use crate::rewrite::HostRule;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use std::fmt::Display;
use std::sync::Arc;

/// POST /proxy/:port/hosts - Append host rules, `[{"host", "newHost"}]`
pub async fn handle_add<B>(
    port: u16,
    req: Request<B>,
    registry: Arc<ProxyRegistry>,
) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Display,
{
    // Unknown port wins over a bad body
    if let Err(e) = registry.get(port) {
        return proxy_error_response(&e);
    }

    let body = match collect_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    let rules: Vec<HostRule> = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid host rules JSON: {e}"),
            )
        }
    };

    match registry.add_host_rules(port, rules) {
        Ok(_) => message_response("Added hosts entries successfully"),
        Err(e) => proxy_error_response(&e),
    }
}

/// GET /proxy/:port/hosts - Current host rules
pub fn handle_get(port: u16, registry: Arc<ProxyRegistry>) -> Response<Full<Bytes>> {
    match registry.host_rules(port) {
        Ok(rules) => json_response(StatusCode::OK, &rules),
        Err(e) => proxy_error_response(&e),
    }
}
