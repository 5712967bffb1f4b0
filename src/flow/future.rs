//! Future wrapper that carries a flow across suspension points.

use super::local::{FlowGuard, Slots};
use core::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A future bound to its own flow.
///
/// On every poll the wrapper installs its table on the polling thread, polls
/// the inner future, and takes the (possibly updated) table back before
/// returning. The value therefore follows the task from one suspension point
/// to the next and from one worker thread to another, and nothing the task
/// writes is visible to the thread that polled it or to sibling tasks.
///
/// Created by [`FlowSnapshot::bind`](super::FlowSnapshot::bind),
/// [`fork`](super::fork) and
/// [`ScopeManager::scoped`](crate::ScopeManager::scoped).
#[must_use = "futures do nothing unless polled"]
pub struct InFlow<F> {
    inner: Pin<Box<F>>,
    slots: Option<Slots>,
}

impl<F> InFlow<F> {
    pub(crate) fn new(future: F, slots: Slots) -> Self {
        Self {
            inner: Box::pin(future),
            slots: Some(slots),
        }
    }
}

impl<F: Future> Future for InFlow<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        // If the inner poll panics the guard restores the polling thread's
        // table during unwinding and this flow's table is lost with it.
        let guard = FlowGuard::install(this.slots.take().unwrap_or_default());
        let poll = this.inner.as_mut().poll(cx);
        this.slots = Some(guard.finish());
        poll
    }
}

impl<F> fmt::Debug for InFlow<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlow")
            .field("scopes", &self.slots.as_ref().map_or(0, |slots| slots.len()))
            .finish_non_exhaustive()
    }
}
