//! Deferred work that runs once a streamed body has been handed off.

use futures_util::Stream;
use std::{
    pin::Pin,
    task::{Context, Poll, ready},
};

/// Work to run after the response body is finished.
pub type AfterHook = Box<dyn FnOnce() + Send + 'static>;

/// Wraps a body stream and runs a hook once the stream is exhausted or dropped,
/// whichever happens first.
///
/// The hook is spawned onto the Tokio runtime rather than called inline, so it
/// never delays the final poll of the body. It runs at most once.
pub struct AfterResponse<S> {
    inner: S,
    hook: Option<AfterHook>,
}

impl<S> AfterResponse<S> {
    pub fn new(inner: S, hook: AfterHook) -> Self {
        Self {
            inner,
            hook: Some(hook),
        }
    }

    fn fire(&mut self) {
        let Some(hook) = self.hook.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { hook() });
            }
            // No runtime left (e.g. during shutdown); run it here.
            Err(_) => hook(),
        }
    }
}

impl<S> Stream for AfterResponse<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let item = ready!(Pin::new(&mut this.inner).poll_next(cx));
        if item.is_none() {
            this.fire();
        }
        Poll::Ready(item)
    }
}

impl<S> Drop for AfterResponse<S> {
    fn drop(&mut self) {
        self.fire();
    }
}
