//! Shared fixtures: an in-process control API, a local origin and clients.

#![allow(dead_code)]

use bytes::Bytes;
use har_proxy::admin_api::AdminApiServer;
use har_proxy::config::{CaptureConfig, ConnectionPoolConfig, RecorderConfig};
use har_proxy::instance::{InstanceSettings, ProxyRegistry};
use har_proxy::proxy::{Transport, UpstreamProxy};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub fn registry() -> Arc<ProxyRegistry> {
    let settings = InstanceSettings {
        bind_host: "127.0.0.1".to_string(),
        capture: CaptureConfig::default(),
        recorder: RecorderConfig {
            poll_interval_ms: 10,
            ..Default::default()
        },
    };
    let transport =
        Transport::with_upstream(&ConnectionPoolConfig::default(), UpstreamProxy::none());
    Arc::new(ProxyRegistry::with_transport(settings, transport))
}

/// Start the control API on an ephemeral port; returns its base URL.
pub async fn start_control_api(registry: Arc<ProxyRegistry>) -> String {
    let server = AdminApiServer::bind("127.0.0.1", 0, registry).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    format!("http://{addr}")
}

/// Origin that answers every request with `{path}|{body}`.
pub async fn spawn_origin() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let service = service_fn(|req: Request<Incoming>| async move {
                    let path = req.uri().path().to_string();
                    let body = req.into_body().collect().await?.to_bytes();
                    let reply = format!("{}|{}", path, String::from_utf8_lossy(&body));
                    let mut response = Response::new(Full::new(Bytes::from(reply)));
                    response
                        .headers_mut()
                        .insert("content-type", "text/plain".parse().unwrap());
                    Ok::<_, hyper::Error>(response)
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });
    addr
}

/// Client that talks to the control API directly.
pub fn control_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Client that sends every http request through the proxy on `port`.
pub fn proxied_client(port: u16) -> reqwest::Client {
    reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(format!("http://127.0.0.1:{port}")).unwrap())
        .build()
        .unwrap()
}

/// Origin that answers HEAD for a resource of `declared` bytes.
pub async fn spawn_head_origin(declared: u64) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let service = service_fn(move |_req: Request<Incoming>| async move {
                    let mut response = Response::new(Full::new(Bytes::new()));
                    response
                        .headers_mut()
                        .insert("content-length", declared.to_string().parse().unwrap());
                    Ok::<_, hyper::Error>(response)
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });
    addr
}
