use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use super::ErrorObserver;
use crate::metrics::ThrottleMetrics;

pub(crate) type Panic = Box<dyn Any + Send + 'static>;

/// What an execution produced: a typed result, or the payload of a panic
pub(crate) type Outcome<T, E> = Result<Result<T, E>, Panic>;

/// Reduce an execution outcome to the value handed to waiters.
///
/// Failures and panics end here. Failures go to the observer, which runs
/// behind its own unwind boundary.
pub(crate) fn contain<T, E: fmt::Debug>(
    outcome: Outcome<T, E>,
    observer: Option<&ErrorObserver<E>>,
    metrics: &ThrottleMetrics,
    name: &str,
) -> Option<T> {
    match outcome {
        Ok(Ok(value)) => Some(value),
        Ok(Err(error)) => {
            metrics.record_failure();
            match observer {
                Some(observer) => {
                    tracing::debug!(
                        throttler = name,
                        ?error,
                        "Operation failed, notifying observer"
                    );
                    notify(observer, &error, metrics, name);
                }
                None => {
                    tracing::warn!(
                        throttler = name,
                        ?error,
                        "Operation failed with no error observer"
                    );
                }
            }
            None
        }
        Err(panic) => {
            metrics.record_panic();
            tracing::error!(
                throttler = name,
                panic = panic_message(&panic),
                "Operation panicked"
            );
            None
        }
    }
}

fn notify<E>(observer: &ErrorObserver<E>, error: &E, metrics: &ThrottleMetrics, name: &str) {
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| observer(error))) {
        metrics.record_observer_panic();
        tracing::error!(
            throttler = name,
            panic = panic_message(&panic),
            "Error observer panicked"
        );
    }
}

fn panic_message(panic: &Panic) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_success_passes_value_through() {
        let metrics = ThrottleMetrics::new();
        let outcome: Outcome<u32, String> = Ok(Ok(5));
        assert_eq!(contain(outcome, None, &metrics, "test"), Some(5));
        assert_eq!(metrics.snapshot().failures, 0);
    }

    #[test]
    fn test_failure_reaches_observer() {
        let metrics = ThrottleMetrics::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let observer: ErrorObserver<String> = {
            let seen = seen.clone();
            Arc::new(move |e: &String| seen.lock().push(e.clone()))
        };

        let outcome: Outcome<u32, String> = Ok(Err("boom".to_string()));
        assert_eq!(contain(outcome, Some(&observer), &metrics, "test"), None);
        assert_eq!(*seen.lock(), vec!["boom".to_string()]);
        assert_eq!(metrics.snapshot().failures, 1);
    }

    #[test]
    fn test_failure_without_observer_is_swallowed() {
        let metrics = ThrottleMetrics::new();
        let outcome: Outcome<u32, String> = Ok(Err("ignored".to_string()));
        assert_eq!(contain(outcome, None, &metrics, "test"), None);
        assert_eq!(metrics.snapshot().failures, 1);
    }

    fn exploding_observer(_: &String) {
        panic!("observer exploded");
    }

    #[test]
    fn test_panicking_observer_is_contained() {
        let metrics = ThrottleMetrics::new();
        let observer: ErrorObserver<String> = Arc::new(exploding_observer);

        let outcome: Outcome<u32, String> = Ok(Err("boom".to_string()));
        assert_eq!(contain(outcome, Some(&observer), &metrics, "test"), None);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.observer_panics, 1);
    }

    #[test]
    fn test_operation_panic_is_contained() {
        let metrics = ThrottleMetrics::new();
        let outcome: Outcome<u32, String> = Err(Box::new("operation exploded"));
        assert_eq!(contain(outcome, None, &metrics, "test"), None);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.panics, 1);
        assert_eq!(snapshot.failures, 0);
    }

    #[test]
    fn test_panic_message() {
        let static_str: Panic = Box::new("static");
        let owned: Panic = Box::new(String::from("owned"));
        let other: Panic = Box::new(42u8);
        assert_eq!(panic_message(&static_str), "static");
        assert_eq!(panic_message(&owned), "owned");
        assert_eq!(panic_message(&other), "non-string panic payload");
    }
}
