//! Per-operation bookkeeping for last-wins delivery.
//!
//! An [`OperationTracker`] exists for each `(group key, operation id)` pair
//! that produced a deferred success in the current run of a group. It lives
//! inside the owning [`GroupQueue`](super::queue::GroupQueue) and is
//! discarded with it, so a new run starts from nothing.

use super::request::{RequestId, SuccessCallback};

/// A success invocation held back until the group drains.
pub(crate) struct DeferredSuccess<V> {
    pub request_id: RequestId,
    pub callback: SuccessCallback<V>,
    pub value: V,
}

impl<V> DeferredSuccess<V> {
    /// Invokes the stored callback with its value.
    pub fn deliver(self) {
        (self.callback)(self.value);
    }
}

/// Bookkeeping for one operation id within a group.
pub(crate) struct OperationTracker<V> {
    /// Most recent undelivered success.
    pending_success: Option<DeferredSuccess<V>>,
}

impl<V> OperationTracker<V> {
    pub fn new() -> Self {
        Self {
            pending_success: None,
        }
    }

    /// Stores a success invocation, returning the one it replaced.
    ///
    /// The replaced invocation must never be delivered.
    pub fn store_success(&mut self, success: DeferredSuccess<V>) -> Option<DeferredSuccess<V>> {
        self.pending_success.replace(success)
    }

    /// Takes the surviving success invocation, if any.
    pub fn take_success(&mut self) -> Option<DeferredSuccess<V>> {
        self.pending_success.take()
    }
}

impl<V> Default for OperationTracker<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for OperationTracker<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationTracker")
            .field(
                "pending_success",
                &self.pending_success.as_ref().map(|s| s.request_id),
            )
            .finish()
    }
}
