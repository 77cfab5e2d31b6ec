//! Capture hooks installed into the forwarding engine of each proxy instance.

use super::channel::CapturePublisher;
use super::duplicator::BodyDuplicator;
use super::transaction::{
    content_length, response_has_body, CapturedBody, RequestSnapshot, ResponseSnapshot,
    Transaction,
};
use crate::config::CaptureConfig;
use crate::proxy::{
    error_response, full, ForwardError, ForwardHooks, PreForward, ProxyBody, RoundTripHook,
    Transport,
};
use crate::rewrite::HostRewriter;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hyper::http::request::Parts;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;
use tracing::warn;

/// Rewrites destinations, timestamps and duplicates bodies, and publishes one
/// [`Transaction`] per forwarded request.
pub struct CaptureInterceptor {
    rewriter: Arc<HostRewriter>,
    publisher: CapturePublisher,
    /// `None` when body capture is disabled
    duplicator: Option<BodyDuplicator>,
}

impl CaptureInterceptor {
    pub fn new(rewriter: Arc<HostRewriter>, publisher: CapturePublisher, config: &CaptureConfig) -> Self {
        Self {
            rewriter,
            publisher,
            duplicator: config
                .capture_content
                .then(|| BodyDuplicator::new(config.max_body_bytes)),
        }
    }
}

fn snapshot(parts: &Parts, body: CapturedBody) -> RequestSnapshot {
    RequestSnapshot {
        method: parts.method.clone(),
        uri: parts.uri.clone(),
        version: parts.version,
        headers: parts.headers.clone(),
        body,
    }
}

#[async_trait]
impl ForwardHooks for CaptureInterceptor {
    type RoundTrip = PendingTransaction;

    async fn before_forward(&self, mut req: Request<ProxyBody>) -> PreForward<PendingTransaction> {
        self.rewriter.apply(&mut req);
        let start = Utc::now();

        let (parts, body) = req.into_parts();
        let declared = content_length(&parts.headers);

        let (body, captured) = match (self.duplicator, declared) {
            (Some(duplicator), Some(len)) if len > 0 => {
                match duplicator.duplicate(body, len).await {
                    Ok(dup) => (full(dup.forward), dup.captured),
                    Err(e) => {
                        let error = ForwardError::Body(e.to_string());
                        warn!("Reading request body for {} failed: {}", parts.uri, e);
                        let now = Utc::now();
                        self.publisher
                            .publish(Transaction {
                                request: snapshot(&parts, CapturedBody::skipped(declared)),
                                response: Err(error.to_string()),
                                start,
                                response_start: now,
                                end: now,
                            })
                            .await;
                        return PreForward::Respond(error_response(
                            StatusCode::BAD_REQUEST,
                            "Failed to read request body",
                        ));
                    }
                }
            }
            _ => (body, CapturedBody::skipped(declared)),
        };

        let pending = PendingTransaction {
            request: snapshot(&parts, captured),
            start,
            publisher: self.publisher.clone(),
            duplicator: self.duplicator,
        };
        PreForward::Forward(Request::from_parts(parts, body), pending)
    }
}

/// State of one in-flight request, carried from the pre-forward hook into its
/// round trip. Correlates the response with the request that caused it.
pub struct PendingTransaction {
    request: RequestSnapshot,
    start: DateTime<Utc>,
    publisher: CapturePublisher,
    duplicator: Option<BodyDuplicator>,
}

impl PendingTransaction {
    async fn publish(self, response: Result<ResponseSnapshot, String>, response_start: DateTime<Utc>) {
        let transaction = Transaction {
            request: self.request,
            response,
            start: self.start,
            response_start,
            end: Utc::now(),
        };
        self.publisher.publish(transaction).await;
    }
}

#[async_trait]
impl RoundTripHook for PendingTransaction {
    async fn round_trip(
        self,
        req: Request<ProxyBody>,
        transport: &Transport,
    ) -> Result<Response<ProxyBody>, ForwardError> {
        let response = match transport.send(req).await {
            Ok(response) => response,
            Err(e) => {
                let now = Utc::now();
                self.publish(Err(e.to_string()), now).await;
                return Err(e);
            }
        };
        let response_start = Utc::now();

        let (parts, body) = response.into_parts();
        let declared = content_length(&parts.headers);

        // Responses without a declared length stream through uncaptured
        let has_body = response_has_body(&self.request.method, parts.status);
        let (body, captured) = match (self.duplicator, declared) {
            _ if !has_body => (body, CapturedBody::skipped(Some(0))),
            (Some(duplicator), Some(len)) if len > 0 => {
                match duplicator.duplicate(body, len).await {
                    Ok(dup) => (full(dup.forward), dup.captured),
                    Err(e) => {
                        let error = ForwardError::Body(e.to_string());
                        self.publish(Err(error.to_string()), response_start).await;
                        return Err(error);
                    }
                }
            }
            _ => (body, CapturedBody::skipped(declared)),
        };

        let snapshot = ResponseSnapshot {
            status: parts.status,
            version: parts.version,
            headers: parts.headers.clone(),
            body: captured,
        };
        self.publish(Ok(snapshot), response_start).await;
        Ok(Response::from_parts(parts, body))
    }
}
