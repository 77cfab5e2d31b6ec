//! Consumer loop fanning transactions out to transform tasks.

use super::pending::PendingWork;
use super::resolve::resolve_server_ip;
use crate::capture::{capture_channel, CapturePublisher, CaptureReceiver, Published};
use crate::config::RecorderConfig;
use crate::har::{HarEntry, HarLog};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Records the transactions of one proxy instance into its [`HarLog`].
pub struct TransactionRecorder {
    log: Arc<HarLog>,
    pending: PendingWork,
    config: RecorderConfig,
}

impl TransactionRecorder {
    pub fn new(log: Arc<HarLog>, config: RecorderConfig) -> Self {
        Self {
            log,
            pending: PendingWork::new(),
            config,
        }
    }

    pub fn log(&self) -> &Arc<HarLog> {
        &self.log
    }

    /// Transactions published but not yet in the log.
    pub fn outstanding(&self) -> usize {
        self.pending.outstanding()
    }

    /// Open the capture channel and start the consumer loop.
    ///
    /// The loop runs until every publisher is dropped, then waits for the
    /// transforms it dispatched before the returned handle completes.
    pub fn start(self: &Arc<Self>) -> (CapturePublisher, JoinHandle<()>) {
        let (publisher, rx) = capture_channel(self.config.channel_capacity, self.pending.clone());
        let recorder = Arc::clone(self);
        let handle = tokio::spawn(async move { recorder.consume(rx).await });
        (publisher, handle)
    }

    async fn consume(&self, mut rx: CaptureReceiver) {
        while let Some(published) = rx.recv().await {
            let log = Arc::clone(&self.log);
            tokio::spawn(record(log, published));
        }
        debug!("Capture channel closed, draining recorder");
        self.wait_for_entries().await;
    }

    /// Block until every published transaction has been appended to the log.
    ///
    /// A warning is logged each time the configured threshold passes; the
    /// wait itself never gives up.
    pub async fn wait_for_entries(&self) {
        self.pending
            .wait_idle(self.config.poll_interval(), self.config.warn_after())
            .await;
    }
}

async fn record(log: Arc<HarLog>, published: Published) {
    let Published {
        transaction,
        ticket,
    } = published;
    let server_ip = resolve_server_ip(&transaction.request.uri).await;
    log.append(HarEntry::from_transaction(&transaction, server_ip));
    drop(ticket);
}
