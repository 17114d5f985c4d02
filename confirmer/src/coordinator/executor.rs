//! Single-request execution with timeout racing.
//!
//! The operation is spawned onto the runtime as its own task and the
//! executor waits on its join handle, optionally bounded by a timer. When the
//! timer wins the handle is dropped, which detaches the operation: it keeps
//! running, but nothing observes its outcome.

use super::request::{Operation, ResultSelector};
use super::result::{ConfirmationFailure, ConfirmationResult};
use std::any::Any;
use std::time::Duration;
use tokio::task::JoinError;

/// Everything needed to run one request's operation.
pub(crate) struct Execution<V, I = V> {
    pub operation: Box<dyn Operation<I, V>>,
    pub selector: Option<ResultSelector<V, I>>,
    pub previous: Option<V>,
    pub timeout: Option<Duration>,
}

impl<V: Send + 'static, I: Send + 'static> Execution<V, I> {
    /// Runs the operation and normalizes its outcome.
    ///
    /// Never panics: operation errors, panics inside the operation or the
    /// result selector, and timeouts all become `ConfirmationResult::Failure`.
    pub async fn run(self) -> ConfirmationResult<V> {
        let Execution {
            operation,
            selector,
            previous,
            timeout,
        } = self;

        let handle = tokio::spawn(async move {
            let input = match (selector, previous) {
                (Some(select), Some(prev)) => Some(select(&prev)),
                _ => None,
            };
            operation.start(input).await
        });

        let joined = match timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => return ConfirmationResult::Failure(ConfirmationFailure::timeout()),
            },
            None => handle.await,
        };

        match joined {
            Ok(Ok(value)) => ConfirmationResult::Success(value),
            Ok(Err(message)) => {
                ConfirmationResult::Failure(ConfirmationFailure::execution(message))
            }
            Err(err) => ConfirmationResult::Failure(ConfirmationFailure::execution(
                join_error_message(err),
            )),
        }
    }
}

/// Extracts a readable message from a failed join.
pub(crate) fn join_error_message(err: JoinError) -> String {
    if err.is_panic() {
        panic_message(err.into_panic().as_ref())
    } else {
        "operation cancelled".to_string()
    }
}

/// Extracts the message carried by a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "operation panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn execution<O>(operation: O, timeout: Option<Duration>) -> Execution<u32>
    where
        O: Operation<u32, u32> + 'static,
    {
        Execution {
            operation: Box::new(operation),
            selector: None,
            previous: None,
            timeout,
        }
    }

    #[tokio::test]
    async fn test_success() {
        let result = execution(|_: Option<u32>| async { Ok::<u32, String>(7) }, None)
            .run()
            .await;
        assert_eq!(result, ConfirmationResult::Success(7));
    }

    #[tokio::test]
    async fn test_error_becomes_failure() {
        let result = execution(|_: Option<u32>| async { Err::<u32, _>("boom") }, None)
            .run()
            .await;
        assert_eq!(
            result,
            ConfirmationResult::Failure(ConfirmationFailure {
                message: "boom".to_string(),
                timed_out: false,
            })
        );
    }

    #[tokio::test]
    async fn test_panic_becomes_failure() {
        let result = execution(
            |_: Option<u32>| async {
                if true {
                    panic!("exploded");
                }
                Ok::<u32, String>(0)
            },
            None,
        )
        .run()
        .await;

        assert_eq!(
            result,
            ConfirmationResult::Failure(ConfirmationFailure {
                message: "exploded".to_string(),
                timed_out: false,
            })
        );
    }

    #[tokio::test]
    async fn test_timeout_detaches_operation() {
        let finished = Arc::new(AtomicBool::new(false));
        let finished_clone = Arc::clone(&finished);

        let result = execution(
            move |_: Option<u32>| async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                finished_clone.store(true, Ordering::SeqCst);
                Ok::<u32, String>(2)
            },
            Some(Duration::from_millis(50)),
        )
        .run()
        .await;

        assert!(result.is_timeout());
        assert!(!finished.load(Ordering::SeqCst));

        // The abandoned operation still runs to completion in the background.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_selector_applied_to_previous() {
        let exec: Execution<u32> = Execution {
            operation: Box::new(|prev: Option<u32>| async move {
                Ok::<u32, String>(prev.unwrap_or(0) * 10)
            }),
            selector: Some(Box::new(|prev: &u32| prev + 1)),
            previous: Some(4),
            timeout: None,
        };
        assert_eq!(exec.run().await, ConfirmationResult::Success(50));
    }

    #[tokio::test]
    async fn test_no_selector_forwards_nothing() {
        let exec: Execution<u32> = Execution {
            operation: Box::new(|prev: Option<u32>| async move {
                Ok::<u32, String>(if prev.is_none() { 1 } else { 0 })
            }),
            selector: None,
            previous: Some(4),
            timeout: None,
        };
        assert_eq!(exec.run().await, ConfirmationResult::Success(1));
    }

    #[tokio::test]
    async fn test_selector_maps_to_other_input_type() {
        let exec: Execution<String, usize> = Execution {
            operation: Box::new(|len: Option<usize>| async move {
                Ok::<String, String>(format!("len={}", len.unwrap_or(0)))
            }),
            selector: Some(Box::new(|prev: &String| prev.len())),
            previous: Some("confirmed".to_string()),
            timeout: None,
        };
        assert_eq!(
            exec.run().await,
            ConfirmationResult::Success("len=9".to_string())
        );
    }

    #[test]
    fn test_panic_message_variants() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(5u8);

        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "operation panicked");
    }
}
