//! Correlated request/response pairs published by the interceptor.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use hyper::{HeaderMap, Method, StatusCode, Uri, Version};

/// Captured copy of a body.
#[derive(Debug, Clone, Default)]
pub struct CapturedBody {
    /// Captured bytes, at most the configured capture bound
    pub bytes: Bytes,
    /// Size of the body as it went over the wire, when known
    pub size: Option<u64>,
    /// The body was larger than the capture bound
    pub truncated: bool,
}

impl CapturedBody {
    /// Body that was forwarded without being duplicated.
    pub fn skipped(declared_len: Option<u64>) -> Self {
        Self {
            bytes: Bytes::new(),
            size: declared_len,
            truncated: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: CapturedBody,
}

#[derive(Debug, Clone)]
pub struct ResponseSnapshot {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: CapturedBody,
}

/// One forwarded call. The response half is the forwarding error when the
/// round trip failed.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub request: RequestSnapshot,
    pub response: Result<ResponseSnapshot, String>,
    pub start: DateTime<Utc>,
    /// Response head received
    pub response_start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Transaction {
    pub fn elapsed_ms(&self) -> i64 {
        (self.end - self.start).num_milliseconds().max(0)
    }
}

/// Declared `Content-Length`, if any. Chunked bodies have no known length.
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(hyper::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Whether a response to `method` with `status` can carry a body at all.
/// HEAD responses and 1xx/204/304 declare a length they never send.
pub fn response_has_body(method: &Method, status: StatusCode) -> bool {
    !(*method == Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bodyless_responses() {
        assert!(!response_has_body(&Method::HEAD, StatusCode::OK));
        assert!(!response_has_body(&Method::GET, StatusCode::NO_CONTENT));
        assert!(!response_has_body(&Method::GET, StatusCode::NOT_MODIFIED));
        assert!(!response_has_body(&Method::GET, StatusCode::CONTINUE));
        assert!(response_has_body(&Method::GET, StatusCode::OK));
        assert!(response_has_body(&Method::POST, StatusCode::CREATED));
    }

    #[test]
    fn test_content_length() {
        let mut headers = HeaderMap::new();
        assert_eq!(content_length(&headers), None);
        headers.insert("content-length", "42".parse().unwrap());
        assert_eq!(content_length(&headers), Some(42));
        headers.insert("content-length", "nope".parse().unwrap());
        assert_eq!(content_length(&headers), None);
    }
}
