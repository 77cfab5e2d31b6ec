//! Append-only, resettable entry store shared by the recorder's transform tasks.

use super::types::{Har, HarEntry};
use parking_lot::Mutex;

/// Starting capacity of a fresh log; grows as needed.
const INITIAL_CAPACITY: usize = 1000;

/// Ordered HAR entries of one proxy instance.
///
/// Every operation takes the same mutex, so an `append` racing a `reset` or
/// `take` lands entirely in either the old or the new sequence.
pub struct HarLog {
    entries: Mutex<Vec<HarEntry>>,
}

impl HarLog {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::with_capacity(INITIAL_CAPACITY)),
        }
    }

    pub fn append(&self, entry: HarEntry) {
        self.entries.lock().push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Copy of the current entries, leaving the log untouched
    pub fn snapshot(&self) -> Vec<HarEntry> {
        self.entries.lock().clone()
    }

    /// Swap in an empty sequence and return the previous one
    pub fn take(&self) -> Vec<HarEntry> {
        std::mem::replace(
            &mut *self.entries.lock(),
            Vec::with_capacity(INITIAL_CAPACITY),
        )
    }

    pub fn reset(&self) {
        drop(self.take());
    }

    /// Current entries as a HAR document
    pub fn to_har(&self) -> Har {
        Har::from_entries(self.snapshot())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_har())
    }
}

impl Default for HarLog {
    fn default() -> Self {
        Self::new()
    }
}
