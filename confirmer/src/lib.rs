//! Confirmer - keyed coordination of asynchronous confirmations
//!
//! This library queues operations whose outcome is only known later (a
//! submitted transaction waiting to be confirmed, a request polled until the
//! backend acknowledges it) under a group key, and controls how they run:
//! one at a time or concurrently, with stale repeats squashed, with timeouts,
//! and with only the latest success reported when asked.
//!
//! # High-Level API
//!
//! ```ignore
//! use confirmer::coordinator::{ConfirmationOptions, ConfirmationRequest, Coordinator, CoordinatorConfig};
//!
//! let coordinator = Coordinator::<String, u64>::new(CoordinatorConfig::default())?;
//!
//! coordinator.submit(
//!     "account-7".to_string(),
//!     ConfirmationRequest::new(|_| async { follow().await }, |block| println!("{block}"))
//!         .with_options(ConfirmationOptions::default().with_operation_id("follow").squashable()),
//! );
//! ```

pub mod config;
pub mod coordinator;
pub mod logging;

/// Version of the confirmer library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
