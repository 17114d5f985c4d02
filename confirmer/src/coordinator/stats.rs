//! Coordinator counters and failure diagnostics.

use super::request::RequestId;
use super::result::ConfirmationFailure;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Point-in-time snapshot of coordinator activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub submitted: u64,
    pub executed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub squashed: u64,
    pub superseded: u64,
    pub deferred_delivered: u64,
    pub active_groups: usize,
}

impl CoordinatorStats {
    /// Requests that have reached a terminal state (resolved or squashed).
    pub fn settled(&self) -> u64 {
        self.succeeded + self.failed + self.squashed
    }
}

/// Lock-free counters behind [`CoordinatorStats`].
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub submitted: AtomicU64,
    pub executed: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    pub timed_out: AtomicU64,
    pub squashed: AtomicU64,
    pub superseded: AtomicU64,
    pub deferred_delivered: AtomicU64,
}

impl StatsCounters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, active_groups: usize) -> CoordinatorStats {
        CoordinatorStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            squashed: self.squashed.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            deferred_delivered: self.deferred_delivered.load(Ordering::Relaxed),
            active_groups,
        }
    }
}

/// A failure that had no `on_fail` callback to receive it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnhandledFailure {
    pub group_key: String,
    pub request_id: RequestId,
    pub failure: ConfirmationFailure,
    pub at: SystemTime,
}

/// Bounded history of unhandled failures, oldest evicted first.
#[derive(Debug)]
pub(crate) struct FailureHistory {
    capacity: usize,
    entries: Mutex<VecDeque<UnhandledFailure>>,
}

impl FailureHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            // Grows on demand; the configured capacity may be arbitrarily large.
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, entry: UnhandledFailure) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn snapshot(&self) -> Vec<UnhandledFailure> {
        self.entries.lock().iter().cloned().collect()
    }
}
