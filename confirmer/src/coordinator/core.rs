//! Coordinator core - registry, submission and diagnostics.
//!
//! This module contains the [`Coordinator`] handle and the shared state its
//! drain workers operate on. The drain loop itself lives in `drain`.

use super::config::CoordinatorConfig;
use super::queue::GroupQueue;
use super::request::{ConfirmationRequest, RequestId};
use super::stats::{CoordinatorStats, FailureHistory, StatsCounters, UnhandledFailure};
use super::telemetry::{NullTelemetrySink, TelemetryEvent, TelemetrySink};
use super::watchdog::{StallWatchdog, StalledRequest};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Bounds required of a group key.
pub trait GroupKey: Eq + Hash + Clone + fmt::Display + Send + Sync + 'static {}

impl<T> GroupKey for T where T: Eq + Hash + Clone + fmt::Display + Send + Sync + 'static {}

/// Bounds required of a confirmed value.
///
/// Values are cloned once per successful serial request so the next request
/// on the key can derive its input from it.
pub trait ConfirmedValue: Clone + Send + 'static {}

impl<T> ConfirmedValue for T where T: Clone + Send + 'static {}

/// Bounds required of the input a request's operation receives.
///
/// Defaults to the confirmed value type; a result selector maps the previous
/// confirmed value into it.
pub trait OperationInput: Send + 'static {}

impl<T> OperationInput for T where T: Send + 'static {}

/// Errors raised while constructing a coordinator.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// No tokio runtime is available to run drain workers on.
    #[error("Coordinator must be created inside a tokio runtime")]
    NoRuntime,
}

// =============================================================================
// Coordinator
// =============================================================================

/// Sequences, parallelizes, squashes and times out confirmation requests
/// keyed by group.
///
/// The handle is cheap to clone; all clones share one registry. Independent
/// coordinators share nothing.
///
/// `V` is the value operations resolve with, `I` the input they receive from
/// the preceding request's result through a result selector.
pub struct Coordinator<K, V, I = V> {
    pub(crate) inner: Arc<Inner<K, V, I>>,
}

/// State shared between the handle and the drain workers.
pub(crate) struct Inner<K, V, I = V> {
    /// Group queues by key. Never held across an await or a callback.
    pub(crate) registry: Mutex<HashMap<K, GroupQueue<V, I>>>,

    pub(crate) config: CoordinatorConfig,

    pub(crate) telemetry: Arc<dyn TelemetrySink>,

    pub(crate) stats: StatsCounters,

    pub(crate) failures: FailureHistory,

    next_request_id: AtomicU64,

    /// Groups removed from the registry whose deferred successes are still
    /// being delivered.
    pub(crate) finalizing: AtomicUsize,

    /// Woken whenever a group finishes draining.
    pub(crate) drained_notify: Notify,

    pub(crate) runtime: Handle,
}

impl<K: GroupKey, V: ConfirmedValue, I: OperationInput> Coordinator<K, V, I> {
    /// Creates a coordinator on the current tokio runtime.
    pub fn new(config: CoordinatorConfig) -> Result<Self, CoordinatorError> {
        Self::with_telemetry(config, Arc::new(NullTelemetrySink))
    }

    /// Creates a coordinator on the current tokio runtime with a telemetry sink.
    pub fn with_telemetry(
        config: CoordinatorConfig,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Result<Self, CoordinatorError> {
        let runtime = Handle::try_current().map_err(|_| CoordinatorError::NoRuntime)?;
        Ok(Self::with_runtime(config, telemetry, runtime))
    }

    /// Creates a coordinator whose drain workers run on `runtime`.
    pub fn with_runtime(
        config: CoordinatorConfig,
        telemetry: Arc<dyn TelemetrySink>,
        runtime: Handle,
    ) -> Self {
        let failures = FailureHistory::new(config.failure_history);
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(HashMap::new()),
                config,
                telemetry,
                stats: StatsCounters::default(),
                failures,
                next_request_id: AtomicU64::new(1),
                finalizing: AtomicUsize::new(0),
                drained_notify: Notify::new(),
                runtime,
            }),
        }
    }

    /// Queues a confirmation request for `key`.
    ///
    /// Returns immediately. The outcome is delivered later through the
    /// request's callbacks; the returned id only correlates telemetry and
    /// diagnostics.
    pub fn submit(&self, key: K, request: ConfirmationRequest<V, I>) -> RequestId {
        let inner = &self.inner;
        let request_id = RequestId::new(inner.next_request_id.fetch_add(1, Ordering::Relaxed));

        let mut request = request;
        if request.timeout.is_none() {
            request.timeout = inner.config.default_timeout;
        }
        let operation_id = request.options.operation_id.clone();

        let (start_worker, notify, queue_depth) = {
            let mut registry = inner.registry.lock();
            let queue = registry.entry(key.clone()).or_default();
            queue.enqueue(request_id, request);
            let start_worker = !queue.draining;
            queue.draining = true;
            (start_worker, queue.notify(), queue.pending_len())
        };

        StatsCounters::incr(&inner.stats.submitted);

        debug!(
            group_key = %key,
            request_id = %request_id,
            operation_id = ?operation_id,
            queue_depth,
            "Confirmation requested"
        );

        inner.telemetry.emit(TelemetryEvent::RequestSubmitted {
            group_key: key.to_string(),
            request_id,
            operation_id,
            queue_depth,
        });

        if start_worker {
            inner.runtime.spawn(Arc::clone(inner).drain(key, notify));
        } else {
            notify.notify_one();
        }

        request_id
    }

    /// Returns a snapshot of the coordinator's counters.
    pub fn stats(&self) -> CoordinatorStats {
        self.inner.stats.snapshot(self.active_groups())
    }

    /// Failures delivered to requests without an `on_fail`, oldest first.
    pub fn recent_unhandled_failures(&self) -> Vec<UnhandledFailure> {
        self.inner.failures.snapshot()
    }

    /// Number of group keys with live bookkeeping.
    pub fn active_groups(&self) -> usize {
        self.inner.registry.lock().len()
    }

    /// True when no group has pending, in-flight or undelivered work.
    pub fn is_idle(&self) -> bool {
        let registry = self.inner.registry.lock();
        registry.is_empty() && self.inner.finalizing.load(Ordering::SeqCst) == 0
    }

    /// Requests for `key` not yet dispatched.
    pub fn pending_len(&self, key: &K) -> usize {
        self.inner
            .registry
            .lock()
            .get(key)
            .map_or(0, |queue| queue.pending_len())
    }

    /// Requests for `key` dispatched but not yet resolved.
    pub fn in_flight_len(&self, key: &K) -> usize {
        self.inner
            .registry
            .lock()
            .get(key)
            .map_or(0, |queue| queue.in_flight_len())
    }

    /// True when `key` has live bookkeeping.
    pub fn contains_group(&self, key: &K) -> bool {
        self.inner.registry.lock().contains_key(key)
    }

    /// Resolves once every group has drained.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.drained_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// In-flight requests older than `threshold`, across all groups.
    pub fn stalled_requests(&self, threshold: Duration) -> Vec<StalledRequest> {
        let registry = self.inner.registry.lock();
        let mut stalled: Vec<StalledRequest> = registry
            .iter()
            .flat_map(|(key, queue)| {
                queue
                    .stalled(threshold)
                    .into_iter()
                    .map(move |(request_id, elapsed)| StalledRequest {
                        group_key: key.to_string(),
                        request_id,
                        elapsed,
                    })
            })
            .collect();
        stalled.sort_by_key(|s| s.request_id);
        stalled
    }

    /// Spawns the stall watchdog; it runs until `shutdown` is cancelled.
    pub fn spawn_watchdog(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let watchdog = StallWatchdog::new(
            self.clone(),
            self.inner.config.stall_threshold,
            self.inner.config.watchdog_interval,
        );
        self.inner.runtime.spawn(watchdog.run(shutdown))
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    pub(crate) fn telemetry(&self) -> &Arc<dyn TelemetrySink> {
        &self.inner.telemetry
    }
}

impl<K, V, I> Clone for Coordinator<K, V, I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, I> fmt::Debug for Coordinator<K, V, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("active_groups", &self.inner.registry.lock().len())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_outside_runtime_fails() {
        let result = Coordinator::<String, u32>::new(CoordinatorConfig::default());
        assert!(matches!(result, Err(CoordinatorError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_coordinator_creation() {
        let coordinator = Coordinator::<String, u32>::new(CoordinatorConfig::default())
            .expect("inside runtime");

        assert!(coordinator.is_idle());
        assert_eq!(coordinator.active_groups(), 0);
        assert_eq!(coordinator.stats(), CoordinatorStats::default());
    }

    #[tokio::test]
    async fn test_submit_assigns_increasing_ids() {
        let coordinator =
            Coordinator::<&'static str, u32>::new(CoordinatorConfig::default()).expect("runtime");

        let first = coordinator.submit(
            "111",
            ConfirmationRequest::new(|_: Option<u32>| async { Ok::<u32, String>(1) }, |_| {}),
        );
        let second = coordinator.submit(
            "111",
            ConfirmationRequest::new(|_: Option<u32>| async { Ok::<u32, String>(2) }, |_| {}),
        );

        assert!(second > first);
        assert_eq!(coordinator.pending_len(&"111"), 2);
        assert!(coordinator.contains_group(&"111"));

        coordinator.wait_idle().await;
        assert!(!coordinator.contains_group(&"111"));
    }

    #[tokio::test]
    async fn test_huge_failure_history_is_accepted() {
        let config = CoordinatorConfig::default().with_failure_history(usize::MAX / 8);
        let coordinator = Coordinator::<u64, u32>::new(config).expect("runtime");

        coordinator.submit(
            1,
            ConfirmationRequest::new(|_: Option<u32>| async { Err::<u32, _>("boom") }, |_| {}),
        );
        coordinator.wait_idle().await;

        assert_eq!(coordinator.recent_unhandled_failures().len(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_registry() {
        let coordinator =
            Coordinator::<u64, u32>::new(CoordinatorConfig::default()).expect("runtime");
        let clone = coordinator.clone();

        clone.submit(
            7,
            ConfirmationRequest::new(|_: Option<u32>| async { Ok::<u32, String>(1) }, |_| {}),
        );
        assert_eq!(coordinator.active_groups(), 1);

        coordinator.wait_idle().await;
        assert_eq!(clone.stats().succeeded, 1);
    }
}
