//! Route dispatch logic for the control-plane API.

use crate::admin_api::handlers::{har, hosts, proxies, system};
use crate::admin_api::types::{error_response, not_found};
use crate::instance::ProxyRegistry;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use std::fmt::Display;
use std::sync::Arc;
use tracing::debug;

/// Parsed route for instance-specific endpoints
#[derive(Debug, PartialEq, Eq)]
enum ProxyRoute {
    /// DELETE /proxy/:port
    Root,
    /// GET/PUT /proxy/:port/har
    Har,
    /// GET/POST /proxy/:port/hosts
    Hosts,
}

impl ProxyRoute {
    /// Parse route from path segments after `/proxy/:port`
    fn parse(segments: &[&str]) -> Option<Self> {
        match segments {
            [] => Some(ProxyRoute::Root),
            ["har"] => Some(ProxyRoute::Har),
            ["hosts"] => Some(ProxyRoute::Hosts),
            _ => None,
        }
    }
}

/// Main request router
pub async fn route_request<B>(
    req: Request<B>,
    registry: Arc<ProxyRegistry>,
) -> Result<Response<Full<Bytes>>, hyper::Error>
where
    B: Body,
    B::Error: Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("Control API: {} {}", method, path);

    let response = route_by_path(&method, &path, req, registry).await;
    Ok(response)
}

/// Route based on path
async fn route_by_path<B>(
    method: &Method,
    path: &str,
    req: Request<B>,
    registry: Arc<ProxyRegistry>,
) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Display,
{
    let trimmed = match path.trim_end_matches('/') {
        "" => "/",
        p => p,
    };

    if let (&Method::GET, "/health") = (method, trimmed) {
        return system::handle_health(registry);
    }

    // Collection routes
    if trimmed == "/proxy" {
        return match *method {
            Method::GET => proxies::handle_list(registry),
            Method::POST => proxies::handle_create(req, registry).await,
            _ => not_found(path),
        };
    }

    // Individual proxy routes
    if let Some(rest) = trimmed.strip_prefix("/proxy/") {
        return route_proxy(method, path, rest, req, registry).await;
    }

    not_found(path)
}

/// Route instance-specific requests
async fn route_proxy<B>(
    method: &Method,
    full_path: &str,
    rest: &str,
    req: Request<B>,
    registry: Arc<ProxyRegistry>,
) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Display,
{
    // Parse: port/remaining/path
    let segments: Vec<&str> = rest.split('/').collect();

    let port: u16 = match segments[0].parse() {
        Ok(p) => p,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid port number"),
    };

    let route = match ProxyRoute::parse(&segments[1..]) {
        Some(r) => r,
        None => return not_found(full_path),
    };

    match (method, route) {
        // /proxy/:port
        (&Method::DELETE, ProxyRoute::Root) => proxies::handle_delete(port, registry).await,

        // /proxy/:port/har
        (&Method::PUT, ProxyRoute::Har) => har::handle_drain(port, registry).await,
        (&Method::GET, ProxyRoute::Har) => har::handle_get(port, registry),

        // /proxy/:port/hosts
        (&Method::POST, ProxyRoute::Hosts) => hosts::handle_add(port, req, registry).await,
        (&Method::GET, ProxyRoute::Hosts) => hosts::handle_get(port, registry),

        _ => not_found(full_path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CaptureConfig, ConnectionPoolConfig, RecorderConfig};
    use crate::instance::InstanceSettings;
    use crate::proxy::{Transport, UpstreamProxy};
    use http_body_util::BodyExt;

    fn registry() -> Arc<ProxyRegistry> {
        let settings = InstanceSettings {
            bind_host: "127.0.0.1".to_string(),
            capture: CaptureConfig::default(),
            recorder: RecorderConfig::default(),
        };
        let transport =
            Transport::with_upstream(&ConnectionPoolConfig::default(), UpstreamProxy::none());
        Arc::new(ProxyRegistry::with_transport(settings, transport))
    }

    async fn call(
        registry: &Arc<ProxyRegistry>,
        method: Method,
        path: &str,
        body: &str,
    ) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap();
        let response = route_request(req, Arc::clone(registry)).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[test]
    fn test_proxy_route_parse() {
        assert_eq!(ProxyRoute::parse(&[]), Some(ProxyRoute::Root));
        assert_eq!(ProxyRoute::parse(&["har"]), Some(ProxyRoute::Har));
        assert_eq!(ProxyRoute::parse(&["hosts"]), Some(ProxyRoute::Hosts));
        assert_eq!(ProxyRoute::parse(&["har", "extra"]), None);
        assert_eq!(ProxyRoute::parse(&["stubs"]), None);
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let registry = registry();
        let (status, body) = call(&registry, Method::GET, "/nope", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No such path: [/nope]");

        let (status, _) = call(&registry, Method::PATCH, "/proxy", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_port_is_400() {
        let registry = registry();
        let (status, _) = call(&registry, Method::DELETE, "/proxy/notaport", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&registry, Method::DELETE, "/proxy/70000", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_list_delete() {
        let registry = registry();

        let (status, body) = call(&registry, Method::POST, "/proxy", "").await;
        assert_eq!(status, StatusCode::OK);
        let port = body["port"].as_u64().unwrap();
        assert_ne!(port, 0);

        let (status, body) = call(&registry, Method::GET, "/proxy", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["proxies"][0]["port"], port);
        assert_eq!(body["proxies"][0]["state"], "running");

        let (status, body) = call(&registry, Method::GET, "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["proxies"], 1);

        let path = format!("/proxy/{port}");
        let (status, body) = call(&registry, Method::DELETE, &path, "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["message"],
            format!("Deleted proxy for port [{port}] successfully")
        );

        let (status, body) = call(&registry, Method::DELETE, &path, "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], format!("No proxy for port [{port}]"));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_json() {
        let registry = registry();
        let (status, body) = call(&registry, Method::POST, "/proxy", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid proxy JSON"));
        assert_eq!(registry.count(), 0);
    }

    #[tokio::test]
    async fn test_hosts_and_har_routes() {
        let registry = registry();
        let port = registry.create(0).await.unwrap();

        let hosts = format!("/proxy/{port}/hosts");
        let (status, body) = call(
            &registry,
            Method::POST,
            &hosts,
            r#"[{"host": "a.test", "newHost": "127.0.0.1:1"}]"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Added hosts entries successfully");

        let (status, body) = call(&registry, Method::GET, &hosts, "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["newHost"], "127.0.0.1:1");

        let (status, _) = call(&registry, Method::POST, &hosts, "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let har = format!("/proxy/{port}/har");
        let (status, body) = call(&registry, Method::PUT, &har, "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["log"]["version"], "1.2");
        assert_eq!(body["log"]["entries"].as_array().unwrap().len(), 0);

        let (status, _) = call(&registry, Method::GET, "/proxy/1/har", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        registry.shutdown().await;
    }
}
