use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

/// Future returned by [`Throttler::request`](super::Throttler::request)
///
/// Resolves once the execution that owns the request has completed. It never
/// fails: the output is `Some(value)` when that execution succeeded and `None`
/// when it failed, panicked, or the throttler was dropped before running it.
/// Requests collapsed into the same trailing execution all observe the same
/// outcome.
#[must_use = "dropping a completion does not cancel the request, but its outcome is lost"]
#[derive(Debug)]
pub struct Completion<T> {
    rx: oneshot::Receiver<Option<T>>,
}

impl<T> Completion<T> {
    pub(crate) fn channel() -> (oneshot::Sender<Option<T>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Completion { rx })
    }
}

impl<T> Future for Completion<T> {
    type Output = Option<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped sender means the throttler went away; still a completion
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.ok().flatten())
    }
}
