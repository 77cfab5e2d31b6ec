//! Control-plane API server.

use crate::admin_api::router::route_request;
use crate::instance::ProxyRegistry;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

pub struct AdminApiServer {
    listener: TcpListener,
    registry: Arc<ProxyRegistry>,
}

impl AdminApiServer {
    /// Bind the control-plane listener; `host` may be a name or an IP literal
    pub async fn bind(
        host: &str,
        port: u16,
        registry: Arc<ProxyRegistry>,
    ) -> Result<Self, anyhow::Error> {
        let listener = TcpListener::bind((host, port)).await?;
        Ok(Self { listener, registry })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, anyhow::Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve control-plane requests until the task is dropped
    pub async fn run(self) -> Result<(), anyhow::Error> {
        info!(
            "HAR proxy control API listening on http://{}",
            self.listener.local_addr()?
        );

        loop {
            let (stream, _) = self.listener.accept().await?;
            let io = TokioIo::new(stream);
            let registry = Arc::clone(&self.registry);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let registry = Arc::clone(&registry);
                    async move { route_request(req, registry).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Control API connection error: {}", e);
                }
            });
        }
    }
}
