//! Stall detection watchdog.
//!
//! Requests submitted without a timeout may wait forever. The watchdog
//! periodically looks for requests that have been in flight longer than the
//! stall threshold and warns about them.

use super::core::{ConfirmedValue, Coordinator, GroupKey, OperationInput};
use super::request::RequestId;
use super::telemetry::TelemetryEvent;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// An in-flight request older than the stall threshold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StalledRequest {
    pub group_key: String,
    pub request_id: RequestId,
    pub elapsed: Duration,
}

/// Stall detection watchdog for a coordinator.
pub struct StallWatchdog<K, V, I = V> {
    coordinator: Coordinator<K, V, I>,

    /// In-flight duration after which a request counts as stalled.
    threshold: Duration,

    /// Check interval.
    interval: Duration,
}

impl<K: GroupKey, V: ConfirmedValue, I: OperationInput> StallWatchdog<K, V, I> {
    pub fn new(coordinator: Coordinator<K, V, I>, threshold: Duration, interval: Duration) -> Self {
        Self {
            coordinator,
            threshold,
            interval,
        }
    }

    /// Runs the watchdog until cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    self.check_health();
                }
            }
        }

        debug!("Stall watchdog stopped");
    }

    /// Checks every group once, returning what was reported.
    pub fn check_health(&self) -> Vec<StalledRequest> {
        let stalled = self.coordinator.stalled_requests(self.threshold);

        if stalled.is_empty() {
            debug!(
                active_groups = self.coordinator.active_groups(),
                "Stall watchdog: coordinator healthy"
            );
            return stalled;
        }

        for request in &stalled {
            warn!(
                group_key = %request.group_key,
                request_id = %request.request_id,
                elapsed_ms = request.elapsed.as_millis(),
                threshold_ms = self.threshold.as_millis(),
                "STALL DETECTED: confirmation in flight for {}s",
                request.elapsed.as_secs()
            );
            self.coordinator
                .telemetry()
                .emit(TelemetryEvent::StallDetected {
                    group_key: request.group_key.clone(),
                    request_id: request.request_id,
                    elapsed: request.elapsed,
                });
        }

        stalled
    }
}
