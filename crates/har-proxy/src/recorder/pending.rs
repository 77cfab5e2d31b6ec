//! Counted barrier over published-but-unrecorded transactions.
//!
//! A ticket is taken when a transaction is published and dropped once its
//! entry is in the log, so the count covers both queued and in-flight work.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, warn};

#[derive(Default)]
struct Inner {
    outstanding: AtomicUsize,
    idle: Notify,
}

#[derive(Clone, Default)]
pub struct PendingWork {
    inner: Arc<Inner>,
}

/// Decrements the barrier on drop.
#[must_use]
pub struct PendingTicket {
    inner: Arc<Inner>,
}

impl Drop for PendingTicket {
    fn drop(&mut self) {
        if self.inner.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

impl PendingWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> PendingTicket {
        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);
        PendingTicket {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Wait until no work is outstanding.
    ///
    /// Never gives up: once `warn_after` has elapsed a warning is logged every
    /// further `warn_after`, and waiting continues.
    pub async fn wait_idle(&self, poll_interval: Duration, warn_after: Duration) {
        let started = Instant::now();
        let mut next_warning = warn_after;

        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a wakeup between the check and the await is not missed
            notified.as_mut().enable();

            let outstanding = self.outstanding();
            if outstanding == 0 {
                return;
            }
            debug!("Waiting for {} entries", outstanding);

            let _ = tokio::time::timeout(poll_interval, notified).await;

            let waited = started.elapsed();
            if waited >= next_warning {
                warn!(
                    "Still waiting for {} entries after {}s",
                    self.outstanding(),
                    waited.as_secs()
                );
                next_warning += warn_after.max(poll_interval);
            }
        }
    }
}
