//! Bounded delivery channel between the interceptor and the recorder.

use super::transaction::Transaction;
use crate::recorder::{PendingTicket, PendingWork};
use tokio::sync::mpsc;
use tracing::warn;

/// A transaction in the channel, holding its slot in the drain barrier.
pub struct Published {
    pub transaction: Transaction,
    pub ticket: PendingTicket,
}

pub type CaptureReceiver = mpsc::Receiver<Published>;

/// Producer side of an instance's capture channel.
///
/// The channel closes once every publisher has been dropped.
#[derive(Clone)]
pub struct CapturePublisher {
    tx: mpsc::Sender<Published>,
    pending: PendingWork,
}

pub fn capture_channel(capacity: usize, pending: PendingWork) -> (CapturePublisher, CaptureReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (CapturePublisher { tx, pending }, rx)
}

impl CapturePublisher {
    /// Send a transaction, waiting for channel capacity if the recorder lags.
    pub async fn publish(&self, transaction: Transaction) {
        let ticket = self.pending.enter();
        if let Err(rejected) = self.tx.send(Published { transaction, ticket }).await {
            warn!(
                "Capture channel closed, dropping transaction for {}",
                rejected.0.transaction.request.uri
            );
        }
    }
}
