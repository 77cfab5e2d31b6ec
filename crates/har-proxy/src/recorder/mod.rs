//! Transaction recorder: turns published transactions into HAR entries.

mod consumer;
mod pending;
mod resolve;

pub use consumer::TransactionRecorder;
pub use pending::{PendingTicket, PendingWork};
pub use resolve::resolve_server_ip;
