//! Normalized outcome of a confirmation request.

use thiserror::Error;

/// Message used for failures caused by the timeout race.
pub const TIMEOUT_MESSAGE: &str = "confirmation timed out";

/// Why a confirmation did not succeed.
///
/// `timed_out` distinguishes the timeout race from an operation that
/// returned an error or panicked.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ConfirmationFailure {
    pub message: String,
    pub timed_out: bool,
}

impl ConfirmationFailure {
    /// Failure raised by the operation itself.
    pub(crate) fn execution(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    /// Failure raised because the operation did not settle in time.
    pub(crate) fn timeout() -> Self {
        Self {
            message: TIMEOUT_MESSAGE.to_string(),
            timed_out: true,
        }
    }
}

/// Outcome of executing one request.
///
/// Only the executor produces these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmationResult<V> {
    Success(V),
    Failure(ConfirmationFailure),
}

impl<V> ConfirmationResult<V> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Failure(f) if f.timed_out)
    }

    /// Returns a short label for logs and telemetry.
    pub fn kind(&self) -> ResultKind {
        match self {
            Self::Success(_) => ResultKind::Success,
            Self::Failure(f) if f.timed_out => ResultKind::TimedOut,
            Self::Failure(_) => ResultKind::Failed,
        }
    }
}

/// Value-free summary of a [`ConfirmationResult`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultKind {
    Success,
    Failed,
    TimedOut,
}

impl std::fmt::Display for ResultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::TimedOut => write!(f, "timed_out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_constructors() {
        let failure = ConfirmationFailure::execution("boom");
        assert_eq!(failure.message, "boom");
        assert!(!failure.timed_out);
        assert_eq!(failure.to_string(), "boom");

        let timeout = ConfirmationFailure::timeout();
        assert!(timeout.timed_out);
        assert_eq!(timeout.message, TIMEOUT_MESSAGE);
    }

    #[test]
    fn test_result_kind() {
        let ok: ConfirmationResult<u8> = ConfirmationResult::Success(1);
        let failed: ConfirmationResult<u8> =
            ConfirmationResult::Failure(ConfirmationFailure::execution("x"));
        let timed_out: ConfirmationResult<u8> =
            ConfirmationResult::Failure(ConfirmationFailure::timeout());

        assert_eq!(ok.kind(), ResultKind::Success);
        assert_eq!(failed.kind(), ResultKind::Failed);
        assert_eq!(timed_out.kind(), ResultKind::TimedOut);
        assert!(ok.is_success());
        assert!(timed_out.is_timeout());
        assert!(!failed.is_timeout());
    }
}
