//! Request dispatch for a proxy listener.

use super::forwarding::{empty, error_response, text_response, ForwardError, ProxyBody, Transport};
use super::hooks::{ForwardHooks, PreForward, RoundTripHook};
use super::listener::ServeContext;
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::upgrade::Upgraded;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, warn};

const NON_PROXY_REQUEST: &str = "This is a proxy server. Does not respond to non-proxy requests.";

/// Answers proxy requests: `CONNECT` is tunnelled, absolute-form requests go
/// through the hooks and the transport.
pub struct ForwardingEngine<H> {
    hooks: H,
    transport: Transport,
}

impl<H: ForwardHooks> ForwardingEngine<H> {
    pub fn new(hooks: H, transport: Transport) -> Self {
        Self { hooks, transport }
    }

    pub async fn handle(
        &self,
        req: Request<Incoming>,
        ctx: &ServeContext,
    ) -> Result<Response<ProxyBody>, Infallible> {
        if req.method() == Method::CONNECT {
            return Ok(self.tunnel(req, ctx).await);
        }

        match req.uri().scheme_str() {
            Some("http") | Some("https") if req.uri().authority().is_some() => {}
            _ => {
                debug!("Rejecting non-proxy request {} {}", req.method(), req.uri());
                return Ok(text_response(StatusCode::BAD_REQUEST, NON_PROXY_REQUEST));
            }
        }

        let req = req.map(|body| body.boxed());
        let response = match self.hooks.before_forward(req).await {
            PreForward::Respond(response) => response,
            PreForward::Forward(req, round_trip) => {
                let target = req.uri().clone();
                match round_trip.round_trip(req, &self.transport).await {
                    Ok(response) => response,
                    Err(e) => {
                        warn!("Forwarding {} failed: {}", target, e);
                        error_response(StatusCode::BAD_GATEWAY, "Bad Gateway")
                    }
                }
            }
        };
        Ok(response)
    }

    /// Open the tunnel target first, then upgrade the client connection and
    /// copy bytes both ways until either side closes or the listener stops.
    async fn tunnel(&self, req: Request<Incoming>, ctx: &ServeContext) -> Response<ProxyBody> {
        let Some(authority) = req.uri().authority().cloned() else {
            return error_response(StatusCode::BAD_REQUEST, "CONNECT target must be host:port");
        };
        let Some(port) = authority.port_u16() else {
            return error_response(StatusCode::BAD_REQUEST, "CONNECT target must be host:port");
        };

        let (mut server, early) = match self.open_tunnel(authority.host(), port).await {
            Ok(opened) => opened,
            Err(e) => {
                warn!("CONNECT {} failed: {}", authority, e);
                return error_response(StatusCode::BAD_GATEWAY, "Bad Gateway");
            }
        };

        let shutdown = ctx.shutdown().clone();
        ctx.spawn(async move {
            let upgraded: Upgraded = match hyper::upgrade::on(req).await {
                Ok(upgraded) => upgraded,
                Err(e) => {
                    warn!("CONNECT {} upgrade failed: {}", authority, e);
                    return;
                }
            };
            let mut client = TokioIo::new(upgraded);
            // Bytes the upstream proxy sent right after its CONNECT response
            if !early.is_empty() {
                if let Err(e) = client.write_all(&early).await {
                    debug!("Tunnel to {} closed: {}", authority, e);
                    return;
                }
            }
            tokio::select! {
                result = tokio::io::copy_bidirectional(&mut client, &mut server) => {
                    match result {
                        Ok((up, down)) => debug!("Tunnel to {} closed ({} bytes up, {} bytes down)", authority, up, down),
                        Err(e) => debug!("Tunnel to {} closed: {}", authority, e),
                    }
                }
                _ = shutdown.cancelled() => {
                    debug!("Tunnel to {} closed by shutdown", authority);
                }
            }
        });

        Response::new(empty())
    }

    /// Connect to the tunnel target, directly or through the upstream proxy.
    /// Also returns any tunnel bytes read together with the upstream proxy's
    /// response head.
    async fn open_tunnel(&self, host: &str, port: u16) -> Result<(TcpStream, Bytes), ForwardError> {
        let target = format!("{host}:{port}");
        let Some(endpoint) = self.transport.upstream().for_tunnel(host, port) else {
            let stream = self.transport.connect(&target).await?;
            return Ok((stream, Bytes::new()));
        };

        debug!("Tunnelling {} via upstream proxy {}", target, endpoint.addr);
        let stream = self.transport.connect(&endpoint.addr).await?;
        let mut stream = BufReader::new(stream);

        let mut head = format!("CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n");
        if let Some(auth) = endpoint.authorization.as_ref().and_then(|v| v.to_str().ok()) {
            head.push_str(&format!("Proxy-Authorization: {auth}\r\n"));
        }
        head.push_str("\r\n");
        let io_error = |e| ForwardError::Connect(endpoint.addr.clone(), e);
        stream.get_mut().write_all(head.as_bytes()).await.map_err(io_error)?;

        let mut status_line = String::new();
        stream.read_line(&mut status_line).await.map_err(io_error)?;
        let accepted = status_line
            .split_whitespace()
            .nth(1)
            .is_some_and(|code| code.starts_with('2'));

        // Skip the remaining response head
        loop {
            let mut line = String::new();
            let read = stream.read_line(&mut line).await.map_err(io_error)?;
            if read == 0 || line == "\r\n" || line == "\n" {
                break;
            }
        }

        if !accepted {
            return Err(ForwardError::Connect(
                endpoint.addr.clone(),
                std::io::Error::other(format!(
                    "upstream proxy refused CONNECT {target}: {}",
                    status_line.trim_end()
                )),
            ));
        }
        let early = Bytes::copy_from_slice(stream.buffer());
        Ok((stream.into_inner(), early))
    }
}
