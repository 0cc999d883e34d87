use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;

use super::containment;
use super::state::{PendingCall, State, Waiters};
use super::{Completion, ErrorObserver, ThrottleConfig, ThrottleError};
use crate::metrics::{MetricsSnapshot, ThrottleMetrics};

type Operation<A, T, E> = Box<dyn Fn(A) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

const DEFAULT_NAME: &str = "default";

/// Wraps an async operation so that it starts at most once per wait window.
///
/// The first request runs the operation right away. Requests arriving while
/// the window is closed (or while an execution is in flight) collapse into a
/// single trailing execution that runs with the arguments of the last of them,
/// no earlier than the time the window reopens.
///
/// Cloning a `Throttler` is cheap and every clone drives the same state.
pub struct Throttler<A, T, E> {
    shared: Arc<Shared<A, T, E>>,
}

struct Shared<A, T, E> {
    operation: Operation<A, T, E>,
    wait: Duration,
    on_error: Option<ErrorObserver<E>>,
    name: String,
    state: Mutex<State<A, T>>,
    /// Mirrors `State::executing` so the trailing timer can wait for idle
    busy: watch::Sender<bool>,
    metrics: ThrottleMetrics,
}

/// What the trailing timer should do next
enum Step<A, T> {
    WaitIdle(watch::Receiver<bool>),
    WaitUntil(Instant),
    Fire(PendingCall<A, T>),
    Done,
}

impl<A, T, E> Throttler<A, T, E>
where
    A: Send + 'static,
    T: Clone + Send + 'static,
    E: fmt::Debug + Send + 'static,
{
    /// Create a throttler around `operation`
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::ZeroWait`] if the configured wait is zero.
    pub fn new<F, Fut>(operation: F, config: ThrottleConfig<E>) -> Result<Self, ThrottleError>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        config.validate()?;

        let operation: Operation<A, T, E> = Box::new(move |args| operation(args).boxed());
        let (busy, _) = watch::channel(false);

        Ok(Throttler {
            shared: Arc::new(Shared {
                operation,
                wait: config.wait,
                on_error: config.on_error,
                name: config.name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
                state: Mutex::new(State::new()),
                busy,
                metrics: ThrottleMetrics::new(),
            }),
        })
    }

    /// Request an execution with `args`
    ///
    /// The decision is taken synchronously: if the window is open and nothing
    /// is in flight, the operation is invoked before this method returns.
    /// Otherwise `args` become (or replace) the pending call.
    ///
    /// The returned future resolves once the execution owning this request
    /// finishes, with `Some(value)` on success and `None` otherwise. It never
    /// fails. Must be called within a Tokio runtime.
    pub fn request(&self, args: A) -> Completion<T> {
        let (tx, completion) = Completion::channel();
        let shared = &self.shared;
        shared.metrics.record_request();

        let now = Instant::now();
        let mut state = shared.state.lock();

        if state.can_execute(now) {
            shared.start(&mut state, now);

            // A pending call still queued here would otherwise run after these newer args
            if let Some(timer) = state.pending_timer.take() {
                timer.abort();
            }
            let waiters = match state.take_pending() {
                Some(mut pending) => {
                    pending.waiters.push(tx);
                    shared.metrics.record_superseded();
                    pending.waiters
                }
                None => Waiters::single(tx),
            };
            drop(state);

            tracing::debug!(
                throttler = %shared.name,
                waiters = waiters.len(),
                "Executing request immediately"
            );
            shared.metrics.record_immediate();
            shared.execute(args, waiters);
            return completion;
        }

        // The timer deadline is fixed here; later requests only swap the arguments
        if let Some(pending) = state.pending.as_mut() {
            pending.args = args;
            pending.waiters.push(tx);
            shared.metrics.record_superseded();
            tracing::debug!(
                throttler = %shared.name,
                waiters = pending.waiters.len(),
                "Replaced arguments of pending call"
            );
            return completion;
        }

        let delay = state.remaining_wait(now);
        state.pending = Some(PendingCall {
            args,
            waiters: Waiters::single(tx),
        });
        let timer = tokio::spawn(Shared::trailing(Arc::downgrade(shared), now + delay));
        state.pending_timer = Some(timer.abort_handle());
        tracing::debug!(
            throttler = %shared.name,
            ?delay,
            "Scheduled trailing execution"
        );

        completion
    }
}

impl<A, T, E> Throttler<A, T, E> {
    /// Number of executions that have finished, whatever their outcome
    pub fn execution_count(&self) -> u64 {
        self.shared.state.lock().execution_count
    }

    /// Earliest instant the next execution may start, `None` before the first one
    pub fn next_execution_time(&self) -> Option<Instant> {
        self.shared.state.lock().next_execution_time
    }

    /// Configured wait window
    pub fn wait(&self) -> Duration {
        self.shared.wait
    }

    /// Label used in log events
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Whether an invocation of the operation is in flight
    pub fn is_executing(&self) -> bool {
        self.shared.state.lock().executing
    }

    /// Whether a trailing execution is queued
    pub fn has_pending(&self) -> bool {
        self.shared.state.lock().pending.is_some()
    }

    /// Snapshot of this throttler's counters
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Export this throttler's counters in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        self.shared.metrics.export_prometheus(&self.shared.name)
    }
}

impl<A, T, E> Shared<A, T, E>
where
    A: Send + 'static,
    T: Clone + Send + 'static,
    E: fmt::Debug + Send + 'static,
{
    /// Mark an execution as started; the caller holds the state lock
    fn start(&self, state: &mut State<A, T>, now: Instant) {
        state.begin(now, self.wait);
        self.busy.send_replace(true);
    }

    /// Invoke the operation and drive it to completion on its own task
    fn execute(self: &Arc<Self>, args: A, waiters: Waiters<T>) {
        let invocation = panic::catch_unwind(AssertUnwindSafe(|| (self.operation)(args)));
        let shared = Arc::clone(self);

        tokio::spawn(async move {
            let outcome = match invocation {
                Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
                Err(panic) => Err(panic),
            };
            let value = containment::contain(
                outcome,
                shared.on_error.as_ref(),
                &shared.metrics,
                &shared.name,
            );

            {
                let mut state = shared.state.lock();
                state.finish();
                shared.busy.send_replace(false);
            }
            shared.metrics.record_completed();

            waiters.settle(value);
        });
    }

    fn next_step(&self, now: Instant) -> Step<A, T> {
        let mut state = self.state.lock();

        if state.pending.is_none() {
            return Step::Done;
        }
        if state.executing {
            return Step::WaitIdle(self.busy.subscribe());
        }
        if let Some(next) = state.next_execution_time.filter(|next| now < *next) {
            return Step::WaitUntil(next);
        }

        match state.take_pending() {
            Some(pending) => {
                self.start(&mut state, now);
                Step::Fire(pending)
            }
            None => Step::Done,
        }
    }

    /// Body of the trailing timer task
    ///
    /// Holds only a weak reference while sleeping, so dropping every handle
    /// lets the shared state go and aborts this task.
    async fn trailing(weak: Weak<Self>, deadline: Instant) {
        tokio::time::sleep_until(deadline).await;

        loop {
            let Some(shared) = weak.upgrade() else {
                return;
            };

            match shared.next_step(Instant::now()) {
                Step::WaitIdle(mut busy) => {
                    drop(shared);
                    if busy.wait_for(|busy| !*busy).await.is_err() {
                        return;
                    }
                }
                Step::WaitUntil(next) => {
                    drop(shared);
                    tokio::time::sleep_until(next).await;
                }
                Step::Fire(pending) => {
                    tracing::debug!(
                        throttler = %shared.name,
                        waiters = pending.waiters.len(),
                        "Starting trailing execution"
                    );
                    shared.metrics.record_trailing();
                    shared.execute(pending.args, pending.waiters);
                    return;
                }
                Step::Done => return,
            }
        }
    }
}

impl<A, T, E> Drop for Shared<A, T, E> {
    fn drop(&mut self) {
        if let Some(timer) = self.state.get_mut().pending_timer.take() {
            timer.abort();
        }
    }
}

impl<A, T, E> Clone for Throttler<A, T, E> {
    fn clone(&self) -> Self {
        Throttler {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A, T, E> fmt::Debug for Throttler<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Throttler")
            .field("name", &self.shared.name)
            .field("wait", &self.shared.wait)
            .field("execution_count", &state.execution_count)
            .field("next_execution_time", &state.next_execution_time)
            .field("executing", &state.executing)
            .field("pending", &state.pending.is_some())
            .finish()
    }
}
