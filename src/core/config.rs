use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{ThrottleError, Throttler};

/// Callback invoked with the failure value whenever the wrapped operation fails
pub type ErrorObserver<E> = Arc<dyn Fn(&E) + Send + Sync + 'static>;

/// Configuration for a [`Throttler`]
///
/// `wait` is the minimum spacing between the start times of two successive
/// executions. `on_error` observes operation failures without affecting the
/// value handed back to callers.
pub struct ThrottleConfig<E> {
    pub wait: Duration,
    pub on_error: Option<ErrorObserver<E>>,
    /// Label attached to log events, useful when several throttlers run side by side
    pub name: Option<String>,
}

impl<E> ThrottleConfig<E> {
    /// Creates a config with the given wait window and no observer
    pub fn new(wait: Duration) -> Self {
        ThrottleConfig {
            wait,
            on_error: None,
            name: None,
        }
    }

    /// Creates a config with a wait window expressed in milliseconds
    pub fn from_millis(wait_ms: u64) -> Self {
        Self::new(Duration::from_millis(wait_ms))
    }

    /// Sets the error observer
    pub fn with_on_error(mut self, observer: impl Fn(&E) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(observer));
        self
    }

    /// Sets the log label
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Rejects configurations the throttler cannot honor
    pub fn validate(&self) -> Result<(), ThrottleError> {
        if self.wait.is_zero() {
            return Err(ThrottleError::ZeroWait);
        }
        Ok(())
    }
}

impl<E> Clone for ThrottleConfig<E> {
    fn clone(&self) -> Self {
        ThrottleConfig {
            wait: self.wait,
            on_error: self.on_error.clone(),
            name: self.name.clone(),
        }
    }
}

impl<E> fmt::Debug for ThrottleConfig<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottleConfig")
            .field("wait", &self.wait)
            .field("on_error", &self.on_error.is_some())
            .field("name", &self.name)
            .finish()
    }
}

/// Builder for creating a [`Throttler`]
pub struct ThrottlerBuilder<E> {
    wait: Option<Duration>,
    on_error: Option<ErrorObserver<E>>,
    name: Option<String>,
}

impl<E> Default for ThrottlerBuilder<E> {
    fn default() -> Self {
        ThrottlerBuilder {
            wait: None,
            on_error: None,
            name: None,
        }
    }
}

impl<E> ThrottlerBuilder<E> {
    /// Create a new throttler builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum spacing between execution starts
    pub fn wait(mut self, wait: Duration) -> Self {
        self.wait = Some(wait);
        self
    }

    /// Set the wait window in milliseconds
    pub fn wait_ms(self, wait_ms: u64) -> Self {
        self.wait(Duration::from_millis(wait_ms))
    }

    /// Set the error observer
    pub fn on_error(mut self, observer: impl Fn(&E) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(observer));
        self
    }

    /// Set the label used in log events
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Produce the config without building a throttler
    pub fn config(self) -> Result<ThrottleConfig<E>, ThrottleError> {
        let config = ThrottleConfig {
            wait: self.wait.ok_or(ThrottleError::MissingWait)?,
            on_error: self.on_error,
            name: self.name,
        };
        config.validate()?;
        Ok(config)
    }

    /// Build the throttler around `operation`
    pub fn build<A, T, F, Fut>(self, operation: F) -> Result<Throttler<A, T, E>, ThrottleError>
    where
        A: Send + 'static,
        T: Clone + Send + 'static,
        E: fmt::Debug + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Throttler::new(operation, self.config()?)
    }
}
