//! Proxy instance CRUD handlers.

use crate::admin_api::types::*;
use crate::instance::ProxyRegistry;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{info, warn};

/// POST /proxy - Create a new proxy instance
pub async fn handle_create<B>(req: Request<B>, registry: Arc<ProxyRegistry>) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Display,
{
    let body = match collect_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    let request: CreateProxyRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateProxyRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(r) => r,
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    &format!("Invalid proxy JSON: {e}"),
                )
            }
        }
    };

    match registry.create(request.port.unwrap_or(0)).await {
        Ok(port) => {
            info!("Created proxy on port {}", port);
            json_response(StatusCode::OK, &ProxyPort { port })
        }
        Err(e) => {
            warn!("Failed to create proxy: {}", e);
            proxy_error_response(&e)
        }
    }
}

/// GET /proxy - List proxy instances
pub fn handle_list(registry: Arc<ProxyRegistry>) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &ListProxiesResponse {
            proxies: registry.list(),
        },
    )
}

/// DELETE /proxy/:port - Stop and remove a proxy instance
pub async fn handle_delete(port: u16, registry: Arc<ProxyRegistry>) -> Response<Full<Bytes>> {
    match registry.delete(port).await {
        Ok(()) => message_response(format!("Deleted proxy for port [{port}] successfully")),
        Err(e) => proxy_error_response(&e),
    }
}
