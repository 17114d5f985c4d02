//! Confirmation Coordinator
//!
//! This module sequences, parallelizes, squashes and times out asynchronous
//! confirmation operations keyed by an arbitrary group identifier.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Coordinator                            │
//! │  submit(key, request) -> RequestId   (never blocks)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Registry: key -> GroupQueue   (one drain worker per key)    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │ Squash      │  │ Executor    │  │ Operation           │  │
//! │  │ filter      │  │ (timeouts)  │  │ trackers            │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Core Concepts
//!
//! - **Group key**: requests with the same key are ordered relative to each
//!   other; different keys are fully independent.
//!
//! - **Serial requests** (default) run one at a time in submission order. The
//!   next serial request starts only after the previous one's callback has
//!   been delivered.
//!
//! - **Parallel requests** start as soon as they reach the front of the
//!   queue, without waiting for anything already running.
//!
//! - **Squashing**: a run of consecutive squashable requests sharing an
//!   operation id is collapsed to its first and last member. The dropped
//!   requests never run and never call back.
//!
//! - **Last-wins**: with `use_only_last_success_call`, successes are held
//!   back and only the most recent one is delivered once the group drains.
//!
//! - **Chaining**: a request's result selector derives its input from the
//!   value the preceding serial request on the key resolved with. The input
//!   type `I` may differ from the resolved type `V` (`Coordinator<K, V, I>`).
//!
//! # Example
//!
//! ```ignore
//! use confirmer::coordinator::{ConfirmationRequest, Coordinator, CoordinatorConfig};
//!
//! let coordinator = Coordinator::<String, u64>::new(CoordinatorConfig::default())?;
//!
//! coordinator.submit(
//!     "user-42".to_string(),
//!     ConfirmationRequest::new(
//!         |_prev| async { submit_and_poll().await },
//!         |block| tracing::info!(block, "Follow confirmed"),
//!     )
//!     .with_on_fail(|failure| tracing::warn!(%failure, "Follow failed")),
//! );
//!
//! coordinator.wait_idle().await;
//! ```

mod config;
mod core;
mod drain;
mod executor;
mod queue;
mod request;
mod result;
mod stats;
mod telemetry;
mod tracker;
mod watchdog;

// Configuration
pub use config::{
    CoordinatorConfig, DEFAULT_FAILURE_HISTORY, DEFAULT_STALL_THRESHOLD_SECS,
    DEFAULT_WATCHDOG_INTERVAL_SECS,
};

// Coordinator
pub use self::core::{ConfirmedValue, Coordinator, CoordinatorError, GroupKey, OperationInput};

// Requests
pub use request::{
    ConfirmationOptions, ConfirmationRequest, FailureCallback, Operation, OperationFuture,
    OperationId, RequestId, ResultSelector, SuccessCallback,
};

// Results
pub use result::{ConfirmationFailure, ConfirmationResult, ResultKind, TIMEOUT_MESSAGE};

// Diagnostics
pub use stats::{CoordinatorStats, UnhandledFailure};
pub use watchdog::{StallWatchdog, StalledRequest};

// Telemetry
pub use telemetry::{
    MultiplexTelemetrySink, NullTelemetrySink, TelemetryEvent, TelemetrySink, TracingTelemetrySink,
};
