use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ErrorKind;

/// Per-kind count of dispatched errors.
///
/// One lock-free counter per [`ErrorKind`]; owned by the server state and
/// shared with the dispatcher.
#[derive(Debug)]
pub struct ErrorCounters {
    counts: [AtomicU64; ErrorKind::ALL.len()],
}

impl Default for ErrorCounters {
    fn default() -> Self {
        Self {
            counts: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }
}

impl ErrorCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, kind: ErrorKind) {
        self.counts[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, kind: ErrorKind) -> u64 {
        self.counts[kind.index()].load(Ordering::Relaxed)
    }

    /// Wire code to count, for every kind seen at least once.
    pub fn snapshot(&self) -> BTreeMap<&'static str, u64> {
        ErrorKind::ALL
            .iter()
            .map(|kind| (kind.code(), self.get(*kind)))
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    pub fn reset(&self) {
        for count in &self.counts {
            count.store(0, Ordering::Relaxed);
        }
    }
}
