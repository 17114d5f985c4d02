//! Per-key queue of unresolved confirmation requests.
//!
//! A [`GroupQueue`] holds the requests for one group key that have not
//! resolved yet: the pending ones waiting for dispatch and the in-flight ones
//! the executor is running, both in submission order. It is only ever touched
//! while the coordinator's registry lock is held.

use super::request::{ConfirmationOptions, ConfirmationRequest, OperationId, RequestId};
use super::tracker::{DeferredSuccess, OperationTracker};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// A request waiting in a group queue.
pub(crate) struct QueuedRequest<V, I = V> {
    pub id: RequestId,
    pub request: ConfirmationRequest<V, I>,
    pub enqueued_at: Instant,
}

impl<V, I> QueuedRequest<V, I> {
    pub fn is_parallel(&self) -> bool {
        self.request.options.parallelizable
    }

    pub fn operation_id(&self) -> Option<&OperationId> {
        self.request.options.operation_id.as_ref()
    }
}

/// A dispatched request that has not resolved yet.
#[derive(Debug)]
struct InFlightEntry {
    id: RequestId,
    options: ConfirmationOptions,
    started_at: Instant,
}

/// Unresolved requests and dispatch state for one group key.
pub(crate) struct GroupQueue<V, I = V> {
    /// Requests not yet dispatched, in submission order.
    pending: VecDeque<QueuedRequest<V, I>>,

    /// True while a drain worker owns this key.
    pub draining: bool,

    /// Dispatched, unresolved requests in dispatch order. Dispatch never
    /// overtakes submission, so the back entry directly precedes the front
    /// of `pending`.
    in_flight: VecDeque<InFlightEntry>,

    /// The serial request currently executing, if any.
    serial_in_flight: Option<RequestId>,

    /// Value of the last serial request that succeeded.
    pub previous_result: Option<V>,

    /// Last-wins bookkeeping by operation id.
    trackers: HashMap<OperationId, OperationTracker<V>>,

    /// Wakes the drain worker when new work is enqueued.
    notify: Arc<Notify>,
}

impl<V, I> GroupQueue<V, I> {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            draining: false,
            in_flight: VecDeque::new(),
            serial_in_flight: None,
            previous_result: None,
            trackers: HashMap::new(),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn notify(&self) -> Arc<Notify> {
        Arc::clone(&self.notify)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Nothing pending and nothing in flight.
    pub fn is_drained(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }

    pub fn enqueue(&mut self, id: RequestId, request: ConfirmationRequest<V, I>) {
        self.pending.push_back(QueuedRequest {
            id,
            request,
            enqueued_at: Instant::now(),
        });
    }

    /// Collapses every run of mutually squashable unresolved requests down to
    /// its first and last member, returning the dropped interior members in
    /// submission order.
    ///
    /// A run may start with the most recently dispatched request while it is
    /// still in flight; only pending members are ever dropped.
    pub fn squash(&mut self) -> Vec<QueuedRequest<V, I>> {
        if self.pending.is_empty() {
            return Vec::new();
        }

        let mut tail: Option<ConfirmationOptions> =
            self.in_flight.back().map(|entry| entry.options.clone());
        let mut run_len = usize::from(tail.is_some());
        let mut kept: VecDeque<QueuedRequest<V, I>> = VecDeque::with_capacity(self.pending.len());
        let mut dropped = Vec::new();

        for queued in self.pending.drain(..) {
            let continues_run = tail
                .as_ref()
                .is_some_and(|last| last.squashes_with(&queued.request.options));

            if continues_run {
                if run_len >= 2 {
                    // The previous tail is now an interior member.
                    if let Some(interior) = kept.pop_back() {
                        dropped.push(interior);
                    }
                }
                run_len = 2;
            } else {
                run_len = 1;
            }
            tail = Some(queued.request.options.clone());
            kept.push_back(queued);
        }

        self.pending = kept;
        dropped
    }

    /// Pops the next request that may start now.
    ///
    /// Parallel requests always may. A serial request waits for the serial
    /// request ahead of it, and everything behind it waits too so dispatch
    /// order never overtakes submission order.
    pub fn next_dispatchable(&mut self) -> Option<QueuedRequest<V, I>> {
        let front = self.pending.front()?;
        if front.is_parallel() || self.serial_in_flight.is_none() {
            self.pending.pop_front()
        } else {
            None
        }
    }

    /// Records that a request has been handed to the executor.
    pub fn mark_dispatched(&mut self, queued: &QueuedRequest<V, I>) {
        self.in_flight.push_back(InFlightEntry {
            id: queued.id,
            options: queued.request.options.clone(),
            started_at: Instant::now(),
        });
        if !queued.is_parallel() {
            self.serial_in_flight = Some(queued.id);
        }
    }

    /// Records that a dispatched request has resolved.
    pub fn mark_resolved(&mut self, id: RequestId) {
        self.in_flight.retain(|entry| entry.id != id);
        if self.serial_in_flight == Some(id) {
            self.serial_in_flight = None;
        }
    }

    pub fn tracker_mut(&mut self, op: &OperationId) -> &mut OperationTracker<V> {
        self.trackers.entry(op.clone()).or_default()
    }

    /// Takes every deferred success still held by the trackers, oldest
    /// request first.
    pub fn take_deferred_successes(&mut self) -> Vec<DeferredSuccess<V>> {
        let mut deferred: Vec<_> = self
            .trackers
            .values_mut()
            .filter_map(|tracker| tracker.take_success())
            .collect();
        deferred.sort_by_key(|d| d.request_id);
        deferred
    }

    /// In-flight requests that have been running longer than `threshold`.
    pub fn stalled(&self, threshold: Duration) -> Vec<(RequestId, Duration)> {
        self.in_flight
            .iter()
            .map(|entry| (entry.id, entry.started_at.elapsed()))
            .filter(|(_, elapsed)| *elapsed > threshold)
            .collect()
    }
}

impl<V, I> Default for GroupQueue<V, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, I> std::fmt::Debug for GroupQueue<V, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupQueue")
            .field("pending", &self.pending.len())
            .field("draining", &self.draining)
            .field("in_flight", &self.in_flight)
            .field("serial_in_flight", &self.serial_in_flight)
            .field("trackers", &self.trackers)
            .finish()
    }
}
