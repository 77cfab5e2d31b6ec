//! A single running proxy instance.

use super::types::{InstanceState, InstanceSummary};
use crate::capture::{CaptureInterceptor, CapturePublisher};
use crate::config::{CaptureConfig, RecorderConfig};
use crate::har::{Har, HarLog};
use crate::proxy::{ForwardingEngine, ServeHandle, StoppableListener, Transport};
use crate::recorder::TransactionRecorder;
use crate::rewrite::{HostRewriter, HostRule, RewriteError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Tasks owned by a live instance, taken by whoever performs the stop.
struct RunningTasks {
    serve: ServeHandle,
    consumer: JoinHandle<()>,
    /// Keeps the capture channel open while the instance is live
    publisher: CapturePublisher,
}

/// One proxy: listener, capture channel, host rules, log and lifecycle state.
pub struct ProxyInstance {
    port: u16,
    state: watch::Sender<InstanceState>,
    log: Arc<HarLog>,
    rewriter: Arc<HostRewriter>,
    recorder: Arc<TransactionRecorder>,
    tasks: Mutex<Option<RunningTasks>>,
    created_at: DateTime<Utc>,
}

impl ProxyInstance {
    /// Start the recorder and the accept loop on an already bound listener.
    pub fn launch(
        listener: StoppableListener,
        capture: &CaptureConfig,
        recorder: &RecorderConfig,
        transport: Transport,
    ) -> Arc<Self> {
        let port = listener.local_addr().port();
        let log = Arc::new(HarLog::new());
        let rewriter = Arc::new(HostRewriter::new());
        let recorder = Arc::new(TransactionRecorder::new(Arc::clone(&log), recorder.clone()));

        let (publisher, consumer) = recorder.start();
        let (state, _) = watch::channel(InstanceState::Created);
        debug!("Proxy on port {} created", port);

        let interceptor = CaptureInterceptor::new(Arc::clone(&rewriter), publisher.clone(), capture);
        let engine = Arc::new(ForwardingEngine::new(interceptor, transport));
        let serve = listener.serve(engine);

        let instance = Arc::new(Self {
            port,
            state,
            log,
            rewriter,
            recorder,
            tasks: Mutex::new(Some(RunningTasks {
                serve,
                consumer,
                publisher,
            })),
            created_at: Utc::now(),
        });
        instance.advance(InstanceState::Running);
        info!("Proxy on port {} running", port);
        instance
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> InstanceState {
        *self.state.borrow()
    }

    pub fn is_live(&self) -> bool {
        self.state().is_live()
    }

    pub fn log(&self) -> &Arc<HarLog> {
        &self.log
    }

    /// Move forward to `next`; never backwards.
    fn advance(&self, next: InstanceState) -> bool {
        self.state.send_if_modified(|state| {
            if *state < next {
                *state = next;
                true
            } else {
                false
            }
        })
    }

    pub fn add_host_rules(&self, rules: Vec<HostRule>) -> Result<usize, RewriteError> {
        let added = self.rewriter.add(rules)?;
        info!(
            "Added {} host rules to proxy on port {} ({} total)",
            added,
            self.port,
            self.rewriter.len()
        );
        Ok(added)
    }

    pub fn host_rules(&self) -> Vec<HostRule> {
        self.rewriter.rules()
    }

    /// Current log as a HAR document, leaving it untouched.
    pub fn har(&self) -> Har {
        self.log.to_har()
    }

    /// Wait for outstanding entries, then atomically take the log and leave
    /// it empty.
    pub async fn drain_and_take(&self) -> Har {
        self.recorder.wait_for_entries().await;
        let entries = self.log.take();
        debug!("Took {} entries from proxy on port {}", entries.len(), self.port);
        Har::from_entries(entries)
    }

    pub fn summary(&self) -> InstanceSummary {
        InstanceSummary {
            port: self.port,
            state: self.state(),
            entries: self.log.len(),
            host_rules: self.host_rules(),
            created_at: self.created_at,
        }
    }

    /// Stop handshake: stop accepting and wait for the serving task and all its
    /// connections to exit, then close the capture channel and wait for the
    /// recorder to drain and exit.
    ///
    /// Returns `true` for the caller that performed the stop. Concurrent
    /// callers wait for it to finish and get `false`.
    pub async fn stop(&self) -> bool {
        let won = self.state.send_if_modified(|state| {
            if state.is_live() {
                *state = InstanceState::Draining;
                true
            } else {
                false
            }
        });
        if !won {
            self.wait_stopped().await;
            return false;
        }

        info!("Proxy on port {} draining", self.port);
        let tasks = self.tasks.lock().take();
        if let Some(RunningTasks {
            serve,
            consumer,
            publisher,
        }) = tasks
        {
            serve.stop_accepting();
            serve.wait().await;
            debug!("Proxy on port {} serving task exited", self.port);

            // Last sender: the consumer sees the channel close once the serve
            // task (and its engine's publisher) is gone
            drop(publisher);
            if let Err(e) = consumer.await {
                error!("Recorder of proxy on port {} failed: {}", self.port, e);
            }
        }

        self.advance(InstanceState::Stopped);
        info!("Proxy on port {} stopped", self.port);
        true
    }

    async fn wait_stopped(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|state| *state == InstanceState::Stopped).await;
    }
}

impl Drop for ProxyInstance {
    fn drop(&mut self) {
        if let Some(tasks) = self.tasks.get_mut().take() {
            tasks.serve.stop_accepting();
        }
    }
}
