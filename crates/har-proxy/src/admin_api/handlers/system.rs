//! System handlers.

use crate::admin_api::types::*;
use crate::instance::ProxyRegistry;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;

/// GET /health - Health check
pub fn handle_health(registry: Arc<ProxyRegistry>) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "proxies": registry.count(),
        }),
    )
}
