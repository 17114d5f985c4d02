//! Telemetry for confirmation coordinator observability.
//!
//! The coordinator emits structured events via a sink abstraction and does
//! not know how they are consumed.
//!
//! # Pattern: Emit, Don't Present
//!
//! The coordinator focuses on emitting structured events. Consumers (logging,
//! metrics, UI) decide how to present or aggregate them.
//!
//! # Example
//!
//! ```ignore
//! use confirmer::coordinator::{TelemetryEvent, TelemetrySink};
//!
//! struct LoggingSink;
//!
//! impl TelemetrySink for LoggingSink {
//!     fn emit(&self, event: TelemetryEvent) {
//!         tracing::info!(?event, "Confirmation event");
//!     }
//! }
//! ```

use super::request::{OperationId, RequestId};
use super::result::ResultKind;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Telemetry Events
// =============================================================================

/// Events emitted while coordinating confirmations.
///
/// Group keys are carried in their `Display` form so the event type does not
/// depend on the coordinator's key type.
#[derive(Clone, Debug)]
pub enum TelemetryEvent {
    // -------------------------------------------------------------------------
    // Request Lifecycle Events
    // -------------------------------------------------------------------------
    /// A request was appended to its group queue.
    RequestSubmitted {
        group_key: String,
        request_id: RequestId,
        operation_id: Option<OperationId>,
        queue_depth: usize,
    },

    /// A request's operation was handed to the executor.
    RequestStarted {
        group_key: String,
        request_id: RequestId,
        parallel: bool,
        wait_time: Duration,
    },

    /// A request resolved successfully.
    RequestSucceeded {
        group_key: String,
        request_id: RequestId,
        duration: Duration,
        deferred: bool,
    },

    /// A request resolved with a failure.
    RequestFailed {
        group_key: String,
        request_id: RequestId,
        result: ResultKind,
        duration: Duration,
        handled: bool,
    },

    /// A request was dropped in favour of a later equivalent request.
    RequestSquashed {
        group_key: String,
        request_id: RequestId,
        operation_id: Option<OperationId>,
    },

    // -------------------------------------------------------------------------
    // Last-Wins Delivery Events
    // -------------------------------------------------------------------------
    /// A held-back success was replaced by a newer one and will never fire.
    SuccessSuperseded {
        group_key: String,
        request_id: RequestId,
    },

    /// The surviving held-back success was delivered on drain.
    DeferredSuccessDelivered {
        group_key: String,
        request_id: RequestId,
    },

    // -------------------------------------------------------------------------
    // Group Events
    // -------------------------------------------------------------------------
    /// A group queue fully drained and was removed from the registry.
    GroupDrained { group_key: String },

    /// A request has been in flight longer than the stall threshold.
    StallDetected {
        group_key: String,
        request_id: RequestId,
        elapsed: Duration,
    },
}

impl TelemetryEvent {
    /// Returns the group key associated with this event.
    pub fn group_key(&self) -> &str {
        match self {
            Self::RequestSubmitted { group_key, .. }
            | Self::RequestStarted { group_key, .. }
            | Self::RequestSucceeded { group_key, .. }
            | Self::RequestFailed { group_key, .. }
            | Self::RequestSquashed { group_key, .. }
            | Self::SuccessSuperseded { group_key, .. }
            | Self::DeferredSuccessDelivered { group_key, .. }
            | Self::GroupDrained { group_key }
            | Self::StallDetected { group_key, .. } => group_key,
        }
    }

    /// Returns the request ID associated with this event, if any.
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::RequestSubmitted { request_id, .. }
            | Self::RequestStarted { request_id, .. }
            | Self::RequestSucceeded { request_id, .. }
            | Self::RequestFailed { request_id, .. }
            | Self::RequestSquashed { request_id, .. }
            | Self::SuccessSuperseded { request_id, .. }
            | Self::DeferredSuccessDelivered { request_id, .. }
            | Self::StallDetected { request_id, .. } => Some(*request_id),
            Self::GroupDrained { .. } => None,
        }
    }

    /// Returns a short name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RequestSubmitted { .. } => "request_submitted",
            Self::RequestStarted { .. } => "request_started",
            Self::RequestSucceeded { .. } => "request_succeeded",
            Self::RequestFailed { .. } => "request_failed",
            Self::RequestSquashed { .. } => "request_squashed",
            Self::SuccessSuperseded { .. } => "success_superseded",
            Self::DeferredSuccessDelivered { .. } => "deferred_success_delivered",
            Self::GroupDrained { .. } => "group_drained",
            Self::StallDetected { .. } => "stall_detected",
        }
    }
}

// =============================================================================
// Telemetry Sink Trait
// =============================================================================

/// Sink for telemetry events.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: events are emitted from every
/// group's drain worker concurrently.
pub trait TelemetrySink: Send + Sync {
    /// Called when a telemetry event occurs.
    ///
    /// Must be fast and non-blocking.
    fn emit(&self, event: TelemetryEvent);
}

// =============================================================================
// Built-in Sink Implementations
// =============================================================================

/// No-op sink for when telemetry is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetrySink;

impl TelemetrySink for NullTelemetrySink {
    fn emit(&self, _event: TelemetryEvent) {}
}

/// Sink that logs events using the `tracing` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn emit(&self, event: TelemetryEvent) {
        match &event {
            TelemetryEvent::RequestSubmitted {
                group_key,
                request_id,
                operation_id,
                queue_depth,
            } => {
                tracing::trace!(
                    group_key = %group_key,
                    request_id = %request_id,
                    operation_id = ?operation_id,
                    queue_depth = queue_depth,
                    "Request submitted"
                );
            }
            TelemetryEvent::RequestStarted {
                group_key,
                request_id,
                parallel,
                wait_time,
            } => {
                tracing::trace!(
                    group_key = %group_key,
                    request_id = %request_id,
                    parallel = parallel,
                    wait_time_ms = wait_time.as_millis(),
                    "Request started"
                );
            }
            TelemetryEvent::RequestSucceeded {
                group_key,
                request_id,
                duration,
                deferred,
            } => {
                tracing::debug!(
                    group_key = %group_key,
                    request_id = %request_id,
                    duration_ms = duration.as_millis(),
                    deferred = deferred,
                    "Request succeeded"
                );
            }
            TelemetryEvent::RequestFailed {
                group_key,
                request_id,
                result,
                duration,
                handled,
            } => {
                tracing::debug!(
                    group_key = %group_key,
                    request_id = %request_id,
                    result = %result,
                    duration_ms = duration.as_millis(),
                    handled = handled,
                    "Request failed"
                );
            }
            TelemetryEvent::RequestSquashed {
                group_key,
                request_id,
                operation_id,
            } => {
                tracing::debug!(
                    group_key = %group_key,
                    request_id = %request_id,
                    operation_id = ?operation_id,
                    "Request squashed"
                );
            }
            TelemetryEvent::SuccessSuperseded {
                group_key,
                request_id,
            } => {
                tracing::debug!(
                    group_key = %group_key,
                    request_id = %request_id,
                    "Success superseded"
                );
            }
            TelemetryEvent::DeferredSuccessDelivered {
                group_key,
                request_id,
            } => {
                tracing::debug!(
                    group_key = %group_key,
                    request_id = %request_id,
                    "Deferred success delivered"
                );
            }
            TelemetryEvent::GroupDrained { group_key } => {
                tracing::trace!(group_key = %group_key, "Group drained");
            }
            TelemetryEvent::StallDetected {
                group_key,
                request_id,
                elapsed,
            } => {
                tracing::warn!(
                    group_key = %group_key,
                    request_id = %request_id,
                    elapsed_ms = elapsed.as_millis(),
                    "Request stalled"
                );
            }
        }
    }
}

/// Sink that forwards events to multiple sinks.
pub struct MultiplexTelemetrySink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl MultiplexTelemetrySink {
    pub fn new(sinks: Vec<Arc<dyn TelemetrySink>>) -> Self {
        Self { sinks }
    }

    pub fn add_sink(&mut self, sink: Arc<dyn TelemetrySink>) {
        self.sinks.push(sink);
    }
}

impl TelemetrySink for MultiplexTelemetrySink {
    fn emit(&self, event: TelemetryEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}

impl std::fmt::Debug for MultiplexTelemetrySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiplexTelemetrySink")
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_null_sink() {
        let sink = NullTelemetrySink;
        sink.emit(TelemetryEvent::GroupDrained {
            group_key: "111".to_string(),
        });
    }

    #[test]
    fn test_tracing_sink() {
        let sink = TracingTelemetrySink;
        sink.emit(TelemetryEvent::RequestSquashed {
            group_key: "111".to_string(),
            request_id: RequestId::new(1),
            operation_id: Some(OperationId::new("edit")),
        });
    }

    #[test]
    fn test_event_accessors() {
        let event = TelemetryEvent::RequestFailed {
            group_key: "222".to_string(),
            request_id: RequestId::new(3),
            result: ResultKind::TimedOut,
            duration: Duration::ZERO,
            handled: true,
        };
        assert_eq!(event.group_key(), "222");
        assert_eq!(event.request_id(), Some(RequestId::new(3)));
        assert_eq!(event.event_type(), "request_failed");

        let drained = TelemetryEvent::GroupDrained {
            group_key: "222".to_string(),
        };
        assert_eq!(drained.request_id(), None);
        assert_eq!(drained.event_type(), "group_drained");
    }

    #[test]
    fn test_multiplex_sink() {
        struct CountingSink(AtomicUsize);

        impl TelemetrySink for CountingSink {
            fn emit(&self, _event: TelemetryEvent) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let sink1 = Arc::new(CountingSink(AtomicUsize::new(0)));
        let sink2 = Arc::new(CountingSink(AtomicUsize::new(0)));

        let mut multiplex =
            MultiplexTelemetrySink::new(vec![Arc::clone(&sink1) as Arc<dyn TelemetrySink>]);
        multiplex.add_sink(Arc::clone(&sink2) as Arc<dyn TelemetrySink>);

        multiplex.emit(TelemetryEvent::GroupDrained {
            group_key: "111".to_string(),
        });

        assert_eq!(sink1.0.load(Ordering::Relaxed), 1);
        assert_eq!(sink2.0.load(Ordering::Relaxed), 1);
    }
}
