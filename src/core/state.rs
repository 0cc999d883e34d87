use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Callers waiting on one execution
pub(crate) struct Waiters<T> {
    senders: Vec<oneshot::Sender<Option<T>>>,
}

impl<T: Clone> Waiters<T> {
    pub(crate) fn single(tx: oneshot::Sender<Option<T>>) -> Self {
        Waiters { senders: vec![tx] }
    }

    pub(crate) fn push(&mut self, tx: oneshot::Sender<Option<T>>) {
        // Forget callers that dropped their completion before growing the buffer
        if self.senders.len() == self.senders.capacity() {
            self.senders.retain(|tx| !tx.is_closed());
        }
        self.senders.push(tx);
    }

    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }

    /// Hand the outcome of a single execution to every waiter
    pub(crate) fn settle(self, outcome: Option<T>) {
        let mut senders = self.senders;
        let Some(last) = senders.pop() else {
            return;
        };
        for tx in senders {
            // Ignore send errors - caller may have dropped its completion
            let _ = tx.send(outcome.clone());
        }
        let _ = last.send(outcome);
    }
}

/// The request waiting for the trailing execution
pub(crate) struct PendingCall<A, T> {
    pub(crate) args: A,
    pub(crate) waiters: Waiters<T>,
}

/// Mutable bookkeeping of a throttler
pub(crate) struct State<A, T> {
    pub(crate) execution_count: u64,
    pub(crate) next_execution_time: Option<Instant>,
    pub(crate) executing: bool,
    pub(crate) pending: Option<PendingCall<A, T>>,
    pub(crate) pending_timer: Option<AbortHandle>,
}

impl<A, T> State<A, T> {
    pub(crate) fn new() -> Self {
        State {
            execution_count: 0,
            next_execution_time: None,
            executing: false,
            pending: None,
            pending_timer: None,
        }
    }

    /// Whether an execution may start right now
    pub(crate) fn can_execute(&self, now: Instant) -> bool {
        !self.executing && self.next_execution_time.is_none_or(|next| now >= next)
    }

    /// Time left until the window reopens, zero if it already has
    pub(crate) fn remaining_wait(&self, now: Instant) -> Duration {
        self.next_execution_time
            .map_or(Duration::ZERO, |next| next.saturating_duration_since(now))
    }

    /// Mark an execution as started at `now`
    pub(crate) fn begin(&mut self, now: Instant, wait: Duration) {
        debug_assert!(!self.executing);
        self.executing = true;
        self.next_execution_time = Some(now + wait);
    }

    /// Mark the in-flight execution as finished
    pub(crate) fn finish(&mut self) {
        self.executing = false;
        self.execution_count += 1;
    }

    /// Detach the pending call together with its timer
    pub(crate) fn take_pending(&mut self) -> Option<PendingCall<A, T>> {
        self.pending_timer = None;
        self.pending.take()
    }
}
