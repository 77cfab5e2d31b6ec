//! Listener with observable "stop accepting" and "fully exited" steps.
//!
//! Every connection (and every tunnel a connection hands off) runs on a task
//! tracked by the listener, so [`ServeHandle::wait`] only returns once no
//! request of this listener can still be in flight.

use super::handler::ForwardingEngine;
use super::hooks::ForwardHooks;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

/// Shared by a listener and the connections it accepted.
#[derive(Clone)]
pub struct ServeContext {
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl ServeContext {
    fn new() -> Self {
        Self {
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Cancelled once the listener stops accepting.
    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Spawn a task the listener waits for before it reports exit.
    pub fn spawn<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(task)
    }
}

pub struct StoppableListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl StoppableListener {
    /// Bind `host:port`; port 0 picks any free port.
    pub async fn bind(host: &str, port: u16) -> std::io::Result<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start the accept loop on its own task.
    pub fn serve<H: ForwardHooks>(self, engine: Arc<ForwardingEngine<H>>) -> ServeHandle {
        let ctx = ServeContext::new();
        let port = self.local_addr.port();
        let listener = self.listener;
        let loop_ctx = ctx.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = loop_ctx.shutdown.cancelled() => {
                        info!("Proxy on port {} stopped accepting", port);
                        break;
                    }
                    result = listener.accept() => {
                        match result {
                            Ok((stream, addr)) => {
                                debug!("Accepted connection from {} on port {}", addr, port);
                                let engine = Arc::clone(&engine);
                                let conn_ctx = loop_ctx.clone();
                                loop_ctx.spawn(serve_connection(stream, engine, conn_ctx, port));
                            }
                            Err(e) => {
                                error!("Accept error on port {}: {}", port, e);
                            }
                        }
                    }
                }
            }

            drop(listener);
            drop(engine);
            loop_ctx.tracker.close();
            loop_ctx.tracker.wait().await;
            debug!("All connections on port {} closed", port);
        });

        ServeHandle { ctx, task }
    }
}

async fn serve_connection<H: ForwardHooks>(
    stream: TcpStream,
    engine: Arc<ForwardingEngine<H>>,
    ctx: ServeContext,
    port: u16,
) {
    let io = TokioIo::new(stream);
    let service_ctx = ctx.clone();
    let service = service_fn(move |req| {
        let engine = Arc::clone(&engine);
        let ctx = service_ctx.clone();
        async move { engine.handle(req, &ctx).await }
    });

    let conn = http1::Builder::new()
        .serve_connection(io, service)
        .with_upgrades();
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                debug!("Connection error on port {}: {}", port, e);
            }
        }
        _ = ctx.shutdown.cancelled() => {
            // Finish the in-flight request, then close instead of keeping alive
            conn.as_mut().graceful_shutdown();
            if let Err(e) = conn.await {
                debug!("Connection error on port {} during shutdown: {}", port, e);
            }
        }
    }
}

/// Control over a running accept loop.
pub struct ServeHandle {
    ctx: ServeContext,
    task: JoinHandle<()>,
}

impl ServeHandle {
    /// Stop accepting new connections. Open connections finish their current
    /// request and are then closed.
    pub fn stop_accepting(&self) {
        self.ctx.shutdown.cancel();
    }

    pub fn is_stopping(&self) -> bool {
        self.ctx.shutdown.is_cancelled()
    }

    /// Wait until the accept loop and every connection task have exited.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            error!("Serve task failed: {}", e);
        }
    }
}
