//! Upstream round trips and proxy response helpers.

use super::client::{create_http_client, HttpClient};
use super::headers::strip_hop_by_hop;
use super::upstream::{UpstreamEndpoint, UpstreamProxy};
use crate::config::ConnectionPoolConfig;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Bytes;
use hyper::client::conn::http1;
use hyper::header::{HeaderValue, CONTENT_TYPE, PROXY_AUTHORIZATION};
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Body type flowing through the forwarding engine in both directions.
pub type ProxyBody = BoxBody<Bytes, hyper::Error>;

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("upstream request failed: {}", error_chain(.0))]
    Upstream(#[from] hyper_util::client::legacy::Error),
    #[error("upstream connection failed: {}", error_chain(.0))]
    Http(#[from] hyper::Error),
    #[error("connect to {0} failed: {1}")]
    Connect(String, std::io::Error),
    #[error("connect to {0} timed out")]
    ConnectTimeout(String),
    #[error("failed to read body: {0}")]
    Body(String),
}

/// Render an error with its sources, `outer: inner: root`.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

pub fn full(bytes: impl Into<Bytes>) -> ProxyBody {
    Full::new(bytes.into())
        .map_err(|never: Infallible| match never {})
        .boxed()
}

pub fn empty() -> ProxyBody {
    Empty::<Bytes>::new()
        .map_err(|never: Infallible| match never {})
        .boxed()
}

/// JSON `{"error": message}` response.
pub fn error_response(status: StatusCode, message: &str) -> Response<ProxyBody> {
    let body = serde_json::json!({ "error": message }).to_string();
    let mut response = Response::new(full(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

pub fn text_response(status: StatusCode, message: &'static str) -> Response<ProxyBody> {
    let mut response = Response::new(full(message));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

/// Performs upstream round trips for every proxy instance.
///
/// Clones share one connection pool.
#[derive(Clone)]
pub struct Transport {
    client: HttpClient,
    upstream: Arc<UpstreamProxy>,
    connect_timeout: Duration,
}

impl Transport {
    /// Pooled client plus upstream proxies discovered from the environment.
    pub fn new(pool: &ConnectionPoolConfig) -> Self {
        Self::with_upstream(pool, UpstreamProxy::from_env())
    }

    pub fn with_upstream(pool: &ConnectionPoolConfig, upstream: UpstreamProxy) -> Self {
        Self {
            client: create_http_client(pool),
            upstream: Arc::new(upstream),
            connect_timeout: Duration::from_secs(pool.connect_timeout_secs),
        }
    }

    pub fn upstream(&self) -> &UpstreamProxy {
        &self.upstream
    }

    /// Forward an absolute-form request and return the upstream response head
    /// with its body still streaming.
    pub async fn send(&self, mut req: Request<ProxyBody>) -> Result<Response<ProxyBody>, ForwardError> {
        strip_hop_by_hop(req.headers_mut());

        let response = match self.upstream.for_request(req.uri()) {
            Some(endpoint) => self.send_via(endpoint, req).await?,
            None => self.client.request(req).await?,
        };

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, body.boxed()))
    }

    /// Send through an upstream HTTP proxy. The absolute-form URI is kept so
    /// the upstream proxy sees the real target.
    async fn send_via(
        &self,
        endpoint: &UpstreamEndpoint,
        mut req: Request<ProxyBody>,
    ) -> Result<Response<hyper::body::Incoming>, ForwardError> {
        debug!("Forwarding {} via upstream proxy {}", req.uri(), endpoint.addr);
        if let Some(auth) = &endpoint.authorization {
            req.headers_mut().insert(PROXY_AUTHORIZATION, auth.clone());
        }

        let stream = self.connect(&endpoint.addr).await?;
        let (mut sender, conn) = http1::handshake(TokioIo::new(stream)).await?;
        let addr = endpoint.addr.clone();
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                warn!("Upstream proxy connection to {} failed: {}", addr, e);
            }
        });

        Ok(sender.send_request(req).await?)
    }

    /// Open a TCP connection bounded by the configured connect timeout.
    pub async fn connect(&self, addr: &str) -> Result<TcpStream, ForwardError> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(ForwardError::Connect(addr.to_string(), e)),
            Err(_) => Err(ForwardError::ConnectTimeout(addr.to_string())),
        }
    }
}
