//! Non-destructive body duplication.
//!
//! A body is read to its end into two sinks: the forward sink keeps every
//! byte for the network, the capture sink keeps at most `limit` bytes for the
//! log. Only the capture copy is bounded.

use super::transaction::CapturedBody;
use bytes::{Bytes, BytesMut};
use http_body_util::BodyExt;
use hyper::body::Body;

/// Capture sink that stops storing once `limit` bytes are buffered but keeps
/// counting what went past.
#[derive(Debug)]
pub struct BoundedBuffer {
    buf: BytesMut,
    limit: usize,
    seen: u64,
}

impl BoundedBuffer {
    pub fn new(limit: usize, size_hint: u64) -> Self {
        let capacity = usize::try_from(size_hint).unwrap_or(limit).min(limit);
        Self {
            buf: BytesMut::with_capacity(capacity),
            limit,
            seen: 0,
        }
    }

    pub fn write(&mut self, chunk: &[u8]) {
        self.seen += chunk.len() as u64;
        let room = self.limit.saturating_sub(self.buf.len());
        let take = room.min(chunk.len());
        self.buf.extend_from_slice(&chunk[..take]);
    }

    pub fn finish(self) -> CapturedBody {
        CapturedBody {
            truncated: self.seen > self.buf.len() as u64,
            bytes: self.buf.freeze(),
            size: Some(self.seen),
        }
    }
}

/// Both halves of a duplicated body.
#[derive(Debug)]
pub struct Duplicated {
    /// Unmodified bytes to hand back to the forwarding engine
    pub forward: Bytes,
    pub captured: CapturedBody,
}

#[derive(Debug, Clone, Copy)]
pub struct BodyDuplicator {
    limit: usize,
}

impl BodyDuplicator {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Read `body` to completion, teeing each data frame into both sinks.
    pub async fn duplicate<B>(&self, mut body: B, size_hint: u64) -> Result<Duplicated, B::Error>
    where
        B: Body<Data = Bytes> + Unpin,
    {
        // The declared length is only a hint; grow as bytes actually arrive
        let initial = usize::try_from(size_hint).unwrap_or(self.limit).min(self.limit);
        let mut forward = BytesMut::with_capacity(initial);
        let mut capture = BoundedBuffer::new(self.limit, size_hint);

        while let Some(frame) = body.frame().await {
            if let Ok(data) = frame?.into_data() {
                capture.write(&data);
                forward.extend_from_slice(&data);
            }
        }

        Ok(Duplicated {
            forward: forward.freeze(),
            captured: capture.finish(),
        })
    }
}
