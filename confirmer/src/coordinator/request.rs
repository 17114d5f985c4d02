//! Confirmation request types.
//!
//! A [`ConfirmationRequest`] is an immutable description of one unit of
//! confirmation work: the async operation to run, its terminal callbacks, an
//! optional result selector, an optional timeout and the grouping options.
//!
//! # Example
//!
//! ```ignore
//! use confirmer::coordinator::{ConfirmationOptions, ConfirmationRequest};
//! use std::time::Duration;
//!
//! let request = ConfirmationRequest::new(
//!     |_prev: Option<u64>| async { Ok::<_, String>(42) },
//!     |value| println!("confirmed {value}"),
//! )
//! .with_on_fail(|failure| eprintln!("failed: {failure}"))
//! .with_timeout(Duration::from_secs(5))
//! .with_options(ConfirmationOptions::new().with_operation_id("follow").squashable());
//! ```

use super::result::ConfirmationFailure;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Boxed future returned by an [`Operation`].
///
/// The error side is already normalized to a message string.
pub type OperationFuture<V> = Pin<Box<dyn Future<Output = Result<V, String>> + Send>>;

/// Callback invoked with the confirmed value.
pub type SuccessCallback<V> = Box<dyn FnOnce(V) + Send>;

/// Callback invoked with the failure description.
pub type FailureCallback = Box<dyn FnOnce(ConfirmationFailure) + Send>;

/// Maps the previous resolved value of a group to this request's input.
pub type ResultSelector<V, I = V> = Box<dyn FnOnce(&V) -> I + Send>;

// =============================================================================
// Operation
// =============================================================================

/// The confirmation work itself.
///
/// `I` is the input forwarded from the previous request's result (through the
/// result selector) and `V` the value the operation resolves with.
///
/// Implemented for any `FnOnce(Option<I>) -> impl Future<Output = Result<V, E>>`
/// where `E: Display`, so plain async closures can be submitted directly.
pub trait Operation<I, V>: Send {
    /// Starts the operation with the forwarded input, if any.
    fn start(self: Box<Self>, input: Option<I>) -> OperationFuture<V>;
}

impl<I, V, F, Fut, E> Operation<I, V> for F
where
    F: FnOnce(Option<I>) -> Fut + Send,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
    E: fmt::Display,
{
    fn start(self: Box<Self>, input: Option<I>) -> OperationFuture<V> {
        let fut = (*self)(input);
        Box::pin(async move { fut.await.map_err(|e| e.to_string()) })
    }
}

// =============================================================================
// Identifiers
// =============================================================================

/// Per-coordinator request sequence number.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct RequestId(u64);

impl RequestId {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw sequence number.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Sub-grouping within a group key used by the squash and last-wins policies.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OperationId({})", self.0)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OperationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OperationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// Options
// =============================================================================

/// Grouping and behaviour options for a request.
///
/// `squashable` and `use_only_last_success_call` only take effect when an
/// `operation_id` is set, since both policies are scoped to an operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfirmationOptions {
    pub operation_id: Option<OperationId>,
    pub parallelizable: bool,
    pub squashable: bool,
    pub use_only_last_success_call: bool,
}

impl ConfirmationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operation_id(mut self, id: impl Into<OperationId>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    /// Dispatch without waiting for same-key predecessors.
    pub fn parallelizable(mut self) -> Self {
        self.parallelizable = true;
        self
    }

    /// Allow this request to be dropped when superseded by a later one.
    pub fn squashable(mut self) -> Self {
        self.squashable = true;
        self
    }

    /// Defer `on_success` so only the last success of the run is delivered.
    pub fn use_only_last_success_call(mut self) -> Self {
        self.use_only_last_success_call = true;
        self
    }

    /// Returns true if this request and `other` may be squashed together.
    pub(crate) fn squashes_with(&self, other: &ConfirmationOptions) -> bool {
        self.squashable
            && other.squashable
            && self.operation_id.is_some()
            && self.operation_id == other.operation_id
    }

    /// Returns the operation id when last-wins delivery applies.
    pub(crate) fn last_wins_operation(&self) -> Option<&OperationId> {
        if self.use_only_last_success_call {
            self.operation_id.as_ref()
        } else {
            None
        }
    }
}

// =============================================================================
// Confirmation Request
// =============================================================================

/// One unit of confirmation work.
///
/// Once submitted the request is owned by the coordinator until it resolves
/// or is squashed.
///
/// `I` defaults to `V`: the input of a chained request is usually derived from,
/// and of the same type as, the value its predecessor resolved with.
pub struct ConfirmationRequest<V, I = V> {
    pub(crate) operation: Box<dyn Operation<I, V>>,
    pub(crate) on_success: SuccessCallback<V>,
    pub(crate) on_fail: Option<FailureCallback>,
    pub(crate) result_selector: Option<ResultSelector<V, I>>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) options: ConfirmationOptions,
}

impl<V: Send + 'static, I: Send + 'static> ConfirmationRequest<V, I> {
    /// Creates a request with the required operation and success callback.
    pub fn new<O, S>(operation: O, on_success: S) -> Self
    where
        O: Operation<I, V> + 'static,
        S: FnOnce(V) + Send + 'static,
    {
        Self {
            operation: Box::new(operation),
            on_success: Box::new(on_success),
            on_fail: None,
            result_selector: None,
            timeout: None,
            options: ConfirmationOptions::default(),
        }
    }

    pub fn with_on_fail<F>(mut self, on_fail: F) -> Self
    where
        F: FnOnce(ConfirmationFailure) + Send + 'static,
    {
        self.on_fail = Some(Box::new(on_fail));
        self
    }

    /// Sets the selector that derives this request's input from the value
    /// the preceding request on the same key resolved with.
    pub fn with_result_selector<F>(mut self, selector: F) -> Self
    where
        F: FnOnce(&V) -> I + Send + 'static,
    {
        self.result_selector = Some(Box::new(selector));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_options(mut self, options: ConfirmationOptions) -> Self {
        self.options = options;
        self
    }
}

impl<V, I> ConfirmationRequest<V, I> {
    pub fn options(&self) -> &ConfirmationOptions {
        &self.options
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn has_on_fail(&self) -> bool {
        self.on_fail.is_some()
    }

    pub fn has_result_selector(&self) -> bool {
        self.result_selector.is_some()
    }
}

impl<V, I> fmt::Debug for ConfirmationRequest<V, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmationRequest")
            .field("options", &self.options)
            .field("timeout", &self.timeout)
            .field("has_on_fail", &self.on_fail.is_some())
            .field("has_result_selector", &self.result_selector.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closure_operation_receives_input() {
        let op = |prev: Option<u32>| async move { Ok::<_, String>(prev.unwrap_or(0) + 1) };
        let boxed: Box<dyn Operation<u32, u32>> = Box::new(op);

        let result = boxed.start(Some(41)).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_closure_operation_error_is_stringified() {
        let op = |_prev: Option<u32>| async move {
            Err::<u32, _>(std::io::Error::new(std::io::ErrorKind::Other, "boom"))
        };
        let boxed: Box<dyn Operation<u32, u32>> = Box::new(op);

        let result = boxed.start(None).await;
        assert_eq!(result, Err("boom".to_string()));
    }

    #[test]
    fn test_squashes_with_requires_matching_operation() {
        let a = ConfirmationOptions::new().with_operation_id("edit").squashable();
        let b = ConfirmationOptions::new().with_operation_id("edit").squashable();
        let c = ConfirmationOptions::new().with_operation_id("other").squashable();
        let d = ConfirmationOptions::new().with_operation_id("edit");
        let no_id = ConfirmationOptions::new().squashable();

        assert!(a.squashes_with(&b));
        assert!(!a.squashes_with(&c));
        assert!(!a.squashes_with(&d));
        assert!(!no_id.squashes_with(&no_id.clone()));
    }

    #[test]
    fn test_last_wins_needs_operation_id() {
        let without_id = ConfirmationOptions::new().use_only_last_success_call();
        assert!(without_id.last_wins_operation().is_none());

        let with_id = without_id.with_operation_id("save");
        assert_eq!(with_id.last_wins_operation(), Some(&OperationId::new("save")));
    }

    #[test]
    fn test_request_builder_sets_fields() {
        let request = ConfirmationRequest::new(
            |_: Option<u8>| async { Ok::<_, String>(1u8) },
            |_| {},
        )
        .with_on_fail(|_| {})
        .with_result_selector(|v: &u8| *v)
        .with_timeout(Duration::from_millis(100))
        .with_options(ConfirmationOptions::new().parallelizable());

        assert!(request.has_on_fail());
        assert!(request.has_result_selector());
        assert_eq!(request.timeout(), Some(Duration::from_millis(100)));
        assert!(request.options().parallelizable);
    }

    #[test]
    fn test_selector_may_change_input_type() {
        let request: ConfirmationRequest<(u64, String), u64> = ConfirmationRequest::new(
            |id: Option<u64>| async move { Ok::<_, String>((id.unwrap_or(0), "post".to_string())) },
            |_| {},
        )
        .with_result_selector(|(id, _title): &(u64, String)| *id);

        assert!(request.has_result_selector());
    }

    #[test]
    fn test_request_id_display() {
        assert_eq!(RequestId::new(7).to_string(), "req-7");
    }
}
