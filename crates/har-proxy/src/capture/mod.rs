//! Transaction capture: the interceptor hooks, body duplication and the
//! channel that hands completed transactions to the recorder.

mod channel;
mod duplicator;
mod interceptor;
mod transaction;

pub use channel::{capture_channel, CapturePublisher, CaptureReceiver, Published};
pub use duplicator::{BodyDuplicator, BoundedBuffer, Duplicated};
pub use interceptor::{CaptureInterceptor, PendingTransaction};
pub use transaction::{
    content_length, CapturedBody, RequestSnapshot, ResponseSnapshot, Transaction,
};
