//! Per-key drain loop.
//!
//! Each group key with live work has exactly one drain worker. The worker
//! repeatedly:
//! 1. Removes the group (and delivers held-back successes) once it is drained
//! 2. Squashes runs of superseded requests
//! 3. Dispatches every request that may start now
//! 4. Waits for an execution to resolve or for new work to be submitted
//!
//! Callbacks are invoked on the worker, outside the registry lock, so serial
//! delivery order matches submission order.

use super::core::{ConfirmedValue, GroupKey, Inner, OperationInput};
use super::executor::{join_error_message, panic_message, Execution};
use super::queue::QueuedRequest;
use super::request::{FailureCallback, OperationId, RequestId, SuccessCallback};
use super::result::{ConfirmationFailure, ConfirmationResult};
use super::stats::{StatsCounters, UnhandledFailure};
use super::telemetry::TelemetryEvent;
use super::tracker::DeferredSuccess;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tokio::sync::Notify;
use tokio::task::{self, JoinError, JoinSet};
use tracing::{debug, error, warn};

/// What the worker keeps for a dispatched request until it resolves.
struct InFlight<V> {
    request_id: RequestId,
    on_success: SuccessCallback<V>,
    on_fail: Option<FailureCallback>,
    parallel: bool,
    last_wins: Option<OperationId>,
    started_at: Instant,
}

/// Outcome of one dispatch pass.
enum DrainStep<V> {
    /// Work remains pending or in flight.
    Active,
    /// The group was removed from the registry.
    Finished(Vec<DeferredSuccess<V>>),
    /// The group vanished from under the worker; nothing left to deliver.
    Lost,
}

/// How a resolved request's outcome reaches the caller.
enum Delivery<V> {
    Success(SuccessCallback<V>, V),
    Deferred {
        superseded: Option<DeferredSuccess<V>>,
    },
    Failure(Option<FailureCallback>, ConfirmationFailure),
}

type Executions<V> = JoinSet<ConfirmationResult<V>>;

impl<K: GroupKey, V: ConfirmedValue, I: OperationInput> Inner<K, V, I> {
    /// Drains the queue for `key` until it is empty and nothing is in flight.
    pub(crate) async fn drain(self: Arc<Self>, key: K, notify: Arc<Notify>) {
        let group_key = key.to_string();
        let mut executions: Executions<V> = JoinSet::new();
        let mut in_flight: HashMap<task::Id, InFlight<V>> = HashMap::new();

        debug!(group_key = %group_key, "Drain worker started");

        loop {
            match self.dispatch_ready(&key, &group_key, &mut executions, &mut in_flight) {
                DrainStep::Active => {}
                DrainStep::Finished(deferred) => {
                    self.finish(&group_key, deferred);
                    return;
                }
                DrainStep::Lost => {
                    self.drained_notify.notify_waiters();
                    return;
                }
            }

            tokio::select! {
                biased;

                Some(joined) = executions.join_next_with_id() => {
                    self.handle_completion(&key, &group_key, joined, &mut in_flight);
                }

                _ = notify.notified() => {}
            }
        }
    }

    /// Squashes and dispatches whatever may run now, or removes the group if
    /// it has fully drained.
    fn dispatch_ready(
        &self,
        key: &K,
        group_key: &str,
        executions: &mut Executions<V>,
        in_flight: &mut HashMap<task::Id, InFlight<V>>,
    ) -> DrainStep<V> {
        let (squashed, ready) = {
            let mut registry = self.registry.lock();
            let Some(queue) = registry.get_mut(key) else {
                error!(group_key = %group_key, "Drain worker lost its group queue");
                return DrainStep::Lost;
            };

            if queue.is_drained() {
                let deferred = queue.take_deferred_successes();
                registry.remove(key);
                // Counted under the lock so `is_idle` never observes the gap
                // between removal and deferred delivery.
                self.finalizing.fetch_add(1, Ordering::SeqCst);
                return DrainStep::Finished(deferred);
            }

            let squashed = queue.squash();

            let mut ready = Vec::new();
            while let Some(queued) = queue.next_dispatchable() {
                queue.mark_dispatched(&queued);
                let previous = if queued.request.result_selector.is_some() {
                    queue.previous_result.clone()
                } else {
                    None
                };
                ready.push((queued, previous));
            }

            (squashed, ready)
        };

        for dropped in squashed {
            self.report_squashed(group_key, dropped);
        }

        for (queued, previous) in ready {
            self.start_execution(group_key, queued, previous, executions, in_flight);
        }

        DrainStep::Active
    }

    /// Records a request dropped by squashing. Its callbacks are never run.
    fn report_squashed(&self, group_key: &str, dropped: QueuedRequest<V, I>) {
        StatsCounters::incr(&self.stats.squashed);

        debug!(
            group_key = %group_key,
            request_id = %dropped.id,
            operation_id = ?dropped.operation_id(),
            "Confirmation squashed"
        );

        self.telemetry.emit(TelemetryEvent::RequestSquashed {
            group_key: group_key.to_string(),
            request_id: dropped.id,
            operation_id: dropped.operation_id().cloned(),
        });
    }

    /// Hands a request to the executor.
    fn start_execution(
        &self,
        group_key: &str,
        queued: QueuedRequest<V, I>,
        previous: Option<V>,
        executions: &mut Executions<V>,
        in_flight: &mut HashMap<task::Id, InFlight<V>>,
    ) {
        let QueuedRequest {
            id: request_id,
            request,
            enqueued_at,
        } = queued;
        let parallel = request.options.parallelizable;
        let last_wins = request.options.last_wins_operation().cloned();

        let execution = Execution {
            operation: request.operation,
            selector: request.result_selector,
            previous,
            timeout: request.timeout,
        };

        StatsCounters::incr(&self.stats.executed);

        debug!(
            group_key = %group_key,
            request_id = %request_id,
            parallel,
            timeout_ms = ?request.timeout.map(|t| t.as_millis()),
            "Confirmation started"
        );

        self.telemetry.emit(TelemetryEvent::RequestStarted {
            group_key: group_key.to_string(),
            request_id,
            parallel,
            wait_time: enqueued_at.elapsed(),
        });

        let task_id = executions.spawn(execution.run()).id();
        in_flight.insert(
            task_id,
            InFlight {
                request_id,
                on_success: request.on_success,
                on_fail: request.on_fail,
                parallel,
                last_wins,
                started_at: Instant::now(),
            },
        );
    }

    /// Applies a resolved execution to the group and delivers its outcome.
    fn handle_completion(
        &self,
        key: &K,
        group_key: &str,
        joined: Result<(task::Id, ConfirmationResult<V>), JoinError>,
        in_flight: &mut HashMap<task::Id, InFlight<V>>,
    ) {
        let (task_id, result) = match joined {
            Ok(completed) => completed,
            Err(err) => {
                let task_id = err.id();
                let failure = ConfirmationFailure::execution(join_error_message(err));
                (task_id, ConfirmationResult::Failure(failure))
            }
        };

        let Some(InFlight {
            request_id,
            on_success,
            on_fail,
            parallel,
            last_wins,
            started_at,
        }) = in_flight.remove(&task_id)
        else {
            error!(group_key = %group_key, "Completion for unknown execution");
            return;
        };

        let duration = started_at.elapsed();
        let kind = result.kind();

        let delivery = {
            let mut registry = self.registry.lock();
            let Some(queue) = registry.get_mut(key) else {
                error!(group_key = %group_key, request_id = %request_id, "Group queue missing on completion");
                return;
            };
            queue.mark_resolved(request_id);

            match result {
                ConfirmationResult::Success(value) => {
                    if !parallel {
                        queue.previous_result = Some(value.clone());
                    }
                    match last_wins {
                        Some(op) => {
                            let superseded = queue.tracker_mut(&op).store_success(DeferredSuccess {
                                request_id,
                                callback: on_success,
                                value,
                            });
                            Delivery::Deferred { superseded }
                        }
                        None => Delivery::Success(on_success, value),
                    }
                }
                ConfirmationResult::Failure(failure) => {
                    if !parallel {
                        queue.previous_result = None;
                    }
                    Delivery::Failure(on_fail, failure)
                }
            }
        };

        match delivery {
            Delivery::Success(callback, value) => {
                StatsCounters::incr(&self.stats.succeeded);
                debug!(
                    group_key = %group_key,
                    request_id = %request_id,
                    duration_ms = duration.as_millis(),
                    "Confirmation succeeded"
                );
                self.telemetry.emit(TelemetryEvent::RequestSucceeded {
                    group_key: group_key.to_string(),
                    request_id,
                    duration,
                    deferred: false,
                });
                invoke_guarded(group_key, request_id, "on_success", move || callback(value));
            }
            Delivery::Deferred { superseded } => {
                StatsCounters::incr(&self.stats.succeeded);
                debug!(
                    group_key = %group_key,
                    request_id = %request_id,
                    duration_ms = duration.as_millis(),
                    "Confirmation succeeded, success call deferred"
                );
                self.telemetry.emit(TelemetryEvent::RequestSucceeded {
                    group_key: group_key.to_string(),
                    request_id,
                    duration,
                    deferred: true,
                });
                if let Some(stale) = superseded {
                    StatsCounters::incr(&self.stats.superseded);
                    debug!(
                        group_key = %group_key,
                        request_id = %stale.request_id,
                        superseded_by = %request_id,
                        "Success call superseded"
                    );
                    self.telemetry.emit(TelemetryEvent::SuccessSuperseded {
                        group_key: group_key.to_string(),
                        request_id: stale.request_id,
                    });
                    drop(stale);
                }
            }
            Delivery::Failure(callback, failure) => {
                StatsCounters::incr(&self.stats.failed);
                if failure.timed_out {
                    StatsCounters::incr(&self.stats.timed_out);
                }
                self.telemetry.emit(TelemetryEvent::RequestFailed {
                    group_key: group_key.to_string(),
                    request_id,
                    result: kind,
                    duration,
                    handled: callback.is_some(),
                });
                match callback {
                    Some(callback) => {
                        if failure.timed_out {
                            warn!(
                                group_key = %group_key,
                                request_id = %request_id,
                                duration_ms = duration.as_millis(),
                                "Confirmation timed out"
                            );
                        } else {
                            debug!(
                                group_key = %group_key,
                                request_id = %request_id,
                                error = %failure,
                                "Confirmation failed"
                            );
                        }
                        invoke_guarded(group_key, request_id, "on_fail", move || {
                            callback(failure)
                        });
                    }
                    None => {
                        warn!(
                            group_key = %group_key,
                            request_id = %request_id,
                            error = %failure,
                            timed_out = failure.timed_out,
                            "Confirmation failed with no failure handler"
                        );
                        self.failures.record(UnhandledFailure {
                            group_key: group_key.to_string(),
                            request_id,
                            failure,
                            at: SystemTime::now(),
                        });
                    }
                }
            }
        }
    }

    /// Delivers held-back successes for a removed group and wakes idle waiters.
    fn finish(&self, group_key: &str, deferred: Vec<DeferredSuccess<V>>) {
        for success in deferred {
            let request_id = success.request_id;
            StatsCounters::incr(&self.stats.deferred_delivered);
            debug!(
                group_key = %group_key,
                request_id = %request_id,
                "Delivering last success call"
            );
            self.telemetry.emit(TelemetryEvent::DeferredSuccessDelivered {
                group_key: group_key.to_string(),
                request_id,
            });
            invoke_guarded(group_key, request_id, "on_success", move || success.deliver());
        }

        debug!(group_key = %group_key, "Group drained");
        self.telemetry.emit(TelemetryEvent::GroupDrained {
            group_key: group_key.to_string(),
        });

        self.finalizing.fetch_sub(1, Ordering::SeqCst);
        self.drained_notify.notify_waiters();
    }
}

/// Runs a caller callback, containing any panic so the worker survives.
fn invoke_guarded(group_key: &str, request_id: RequestId, callback: &str, f: impl FnOnce()) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
        error!(
            group_key = %group_key,
            request_id = %request_id,
            callback,
            panic = %panic_message(payload.as_ref()),
            "Confirmation callback panicked"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{Coordinator, CoordinatorConfig};
    use std::time::Duration;

    #[tokio::test]
    async fn test_worker_without_group_keeps_idle_accounting() {
        let coordinator =
            Coordinator::<&'static str, u32>::new(CoordinatorConfig::default()).expect("runtime");

        Arc::clone(&coordinator.inner)
            .drain("missing", Arc::new(Notify::new()))
            .await;

        assert_eq!(coordinator.inner.finalizing.load(Ordering::SeqCst), 0);
        assert!(coordinator.is_idle());
        tokio::time::timeout(Duration::from_millis(100), coordinator.wait_idle())
            .await
            .expect("coordinator reports idle");
    }
}
