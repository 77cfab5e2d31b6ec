//! Request/response types and helpers for the control-plane API.

use crate::instance::{InstanceSummary, ProxyError};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Body of `POST /proxy`; an absent body or port means any free port
#[derive(Debug, Default, Deserialize)]
pub struct CreateProxyRequest {
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Serialize)]
pub struct ProxyPort {
    pub port: u16,
}

#[derive(Debug, Serialize)]
pub struct ListProxiesResponse {
    pub proxies: Vec<InstanceSummary>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Create a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    build_response_with_headers(status, [("Content-Type", "application/json")], json)
}

/// Build an HTTP response with headers.
///
/// A builder failure falls back to a bare response with the given body.
pub fn build_response_with_headers(
    status: StatusCode,
    headers: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let body = body.into();
    let mut builder = Response::builder().status(status);
    for (key, value) in headers {
        builder = builder.header(key.as_ref(), value.as_ref());
    }
    builder
        .body(Full::new(body.clone()))
        .unwrap_or_else(|_| Response::new(Full::new(body)))
}

pub fn message_response(message: impl Into<String>) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &MessageResponse {
            message: message.into(),
        },
    )
}

/// Create an error response, `{"error": message}`
pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(
        status,
        &ErrorResponse {
            error: message.to_string(),
        },
    )
}

pub fn not_found(path: &str) -> Response<Full<Bytes>> {
    error_response(StatusCode::NOT_FOUND, &format!("No such path: [{path}]"))
}

/// Map a registry error to its HTTP status.
pub fn proxy_error_response(error: &ProxyError) -> Response<Full<Bytes>> {
    let status = match error {
        ProxyError::NotFound(_) => StatusCode::NOT_FOUND,
        ProxyError::PortInUse(_) | ProxyError::InvalidHostRules(_) => StatusCode::BAD_REQUEST,
        ProxyError::BindError(..) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, &error.to_string())
}

/// Collect request body into bytes
pub async fn collect_body<B>(req: Request<B>) -> Result<Bytes, String>
where
    B: Body,
    B::Error: Display,
{
    req.into_body()
        .collect()
        .await
        .map(|c| c.to_bytes())
        .map_err(|e| format!("Failed to read request body: {e}"))
}
