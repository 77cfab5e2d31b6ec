//! Tests for the instance module.
//!
//! - ProxyRegistry create/get/stop/delete semantics
//! - Concurrent creates and deletes
//! - Stop handshake ordering with in-flight traffic

use super::*;
use crate::config::{CaptureConfig, ConnectionPoolConfig, RecorderConfig};
use crate::proxy::{Transport, UpstreamProxy};
use crate::rewrite::HostRule;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

fn registry() -> ProxyRegistry {
    let settings = InstanceSettings {
        bind_host: "127.0.0.1".to_string(),
        capture: CaptureConfig::default(),
        recorder: RecorderConfig {
            poll_interval_ms: 10,
            ..Default::default()
        },
    };
    let transport = Transport::with_upstream(&ConnectionPoolConfig::default(), UpstreamProxy::none());
    ProxyRegistry::with_transport(settings, transport)
}

/// Origin that answers after `delay`.
async fn spawn_slow_origin(delay: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let service = service_fn(move |_req: Request<Incoming>| async move {
                    tokio::time::sleep(delay).await;
                    Ok::<_, hyper::Error>(Response::new(Full::new(Bytes::from_static(b"done"))))
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });
    addr
}

async fn get_through(proxy_port: u16, url: String) -> StatusCode {
    let stream = TcpStream::connect(("127.0.0.1", proxy_port)).await.unwrap();
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .unwrap();
    tokio::spawn(conn);
    let req = Request::get(url).body(Full::new(Bytes::new())).unwrap();
    let response = sender.send_request(req).await.unwrap();
    let status = response.status();
    response.into_body().collect().await.unwrap();
    status
}

#[tokio::test]
async fn test_create_ephemeral_port() {
    let registry = registry();
    let port = registry.create(0).await.unwrap();
    assert_ne!(port, 0);

    let instance = registry.get(port).unwrap();
    assert_eq!(instance.port(), port);
    assert_eq!(instance.state(), InstanceState::Running);
    assert_eq!(registry.count(), 1);
    assert_eq!(registry.ports(), vec![port]);

    registry.delete(port).await.unwrap();
    assert_eq!(instance.state(), InstanceState::Stopped);
    assert_eq!(registry.count(), 0);
}

#[tokio::test]
async fn test_explicit_port_in_use() {
    let registry = registry();
    let port = registry.create(0).await.unwrap();

    assert!(matches!(
        registry.create(port).await,
        Err(ProxyError::PortInUse(p)) if p == port
    ));
    assert_eq!(registry.count(), 1);
    registry.shutdown().await;
}

#[tokio::test]
async fn test_bind_error_leaves_registry_untouched() {
    let registry = registry();
    let held = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = held.local_addr().unwrap().port();

    assert!(matches!(
        registry.create(port).await,
        Err(ProxyError::BindError(p, _)) if p == port
    ));
    assert_eq!(registry.count(), 0);
}

#[tokio::test]
async fn test_concurrent_ephemeral_creates_get_distinct_ports() {
    let registry = Arc::new(registry());
    let creates: Vec<_> = (0..16)
        .map(|_| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.create(0).await })
        })
        .collect();

    let mut ports = HashSet::new();
    for create in creates {
        ports.insert(create.await.unwrap().unwrap());
    }
    assert_eq!(ports.len(), 16);
    assert_eq!(registry.count(), 16);

    registry.shutdown().await;
    assert_eq!(registry.count(), 0);
}

#[tokio::test]
async fn test_delete_unknown_and_repeated() {
    let registry = registry();
    let keep = registry.create(0).await.unwrap();
    let remove = registry.create(0).await.unwrap();

    assert!(matches!(registry.delete(1).await, Err(ProxyError::NotFound(1))));

    registry.delete(remove).await.unwrap();
    assert!(matches!(
        registry.delete(remove).await,
        Err(ProxyError::NotFound(p)) if p == remove
    ));
    assert!(matches!(registry.get(remove), Err(ProxyError::NotFound(_))));

    assert_eq!(registry.get(keep).unwrap().state(), InstanceState::Running);
    assert_eq!(registry.count(), 1);
    registry.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_deletes_stop_once() {
    let registry = Arc::new(registry());
    let port = registry.create(0).await.unwrap();

    let deletes: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.delete(port).await })
        })
        .collect();

    let mut ok = 0;
    for delete in deletes {
        match delete.await.unwrap() {
            Ok(()) => ok += 1,
            Err(ProxyError::NotFound(p)) => assert_eq!(p, port),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(registry.count(), 0);
}

#[tokio::test]
async fn test_host_rules_through_registry() {
    let registry = registry();
    let port = registry.create(0).await.unwrap();

    let added = registry
        .add_host_rules(port, vec![HostRule::new("a.test", "b.test")])
        .unwrap();
    assert_eq!(added, 1);
    assert_eq!(
        registry.host_rules(port).unwrap(),
        vec![HostRule::new("a.test", "b.test")]
    );

    assert!(matches!(
        registry.add_host_rules(port, vec![HostRule::new("c.test", "not a host")]),
        Err(ProxyError::InvalidHostRules(_))
    ));
    assert_eq!(registry.host_rules(port).unwrap().len(), 1);

    assert!(matches!(
        registry.add_host_rules(1, vec![]),
        Err(ProxyError::NotFound(1))
    ));
    registry.shutdown().await;
}

#[tokio::test]
async fn test_stop_waits_for_in_flight_transaction() {
    let origin = spawn_slow_origin(Duration::from_millis(300)).await;
    let registry = Arc::new(registry());
    let port = registry.create(0).await.unwrap();
    let instance = registry.get(port).unwrap();

    let request = tokio::spawn(get_through(port, format!("http://{origin}/slow")));
    // Let the request reach the origin before stopping
    tokio::time::sleep(Duration::from_millis(100)).await;

    registry.stop(port).await.unwrap();
    assert_eq!(instance.state(), InstanceState::Stopped);
    assert_eq!(request.await.unwrap(), StatusCode::OK);

    // The recorder drained before the handshake completed
    let entries = instance.log().snapshot();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].request.url, format!("http://{origin}/slow"));
    assert_eq!(entries[0].response.status, 200);
    assert!(matches!(registry.get(port), Err(ProxyError::NotFound(_))));
}

#[tokio::test]
async fn test_list_reports_live_instances() {
    let registry = registry();
    let a = registry.create(0).await.unwrap();
    let b = registry.create(0).await.unwrap();

    let summaries = registry.list();
    let ports: Vec<u16> = summaries.iter().map(|s| s.port).collect();
    let mut expected = vec![a, b];
    expected.sort_unstable();
    assert_eq!(ports, expected);
    assert!(summaries.iter().all(|s| s.state == InstanceState::Running));
    assert!(summaries.iter().all(|s| s.entries == 0));

    registry.shutdown().await;
    assert!(registry.list().is_empty());
}
