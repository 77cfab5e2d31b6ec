//! Hook points the forwarding engine exposes around every forwarded request.

use super::forwarding::{ForwardError, ProxyBody, Transport};
use async_trait::async_trait;
use hyper::{Request, Response};

/// Outcome of the pre-forward hook.
pub enum PreForward<R> {
    /// Forward this (possibly modified) request through the round-trip hook.
    Forward(Request<ProxyBody>, R),
    /// Answer the client directly without contacting the upstream.
    Respond(Response<ProxyBody>),
}

/// Called once per absolute-form request before it is forwarded.
#[async_trait]
pub trait ForwardHooks: Send + Sync + 'static {
    /// Per-request state carried from the pre-forward hook into the round trip.
    type RoundTrip: RoundTripHook;

    async fn before_forward(&self, req: Request<ProxyBody>) -> PreForward<Self::RoundTrip>;
}

/// Wraps the upstream round trip of a single request.
#[async_trait]
pub trait RoundTripHook: Send + 'static {
    async fn round_trip(
        self,
        req: Request<ProxyBody>,
        transport: &Transport,
    ) -> Result<Response<ProxyBody>, ForwardError>;
}

/// Forwards requests untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

#[async_trait]
impl ForwardHooks for Passthrough {
    type RoundTrip = Passthrough;

    async fn before_forward(&self, req: Request<ProxyBody>) -> PreForward<Passthrough> {
        PreForward::Forward(req, Passthrough)
    }
}

#[async_trait]
impl RoundTripHook for Passthrough {
    async fn round_trip(
        self,
        req: Request<ProxyBody>,
        transport: &Transport,
    ) -> Result<Response<ProxyBody>, ForwardError> {
        transport.send(req).await
    }
}
