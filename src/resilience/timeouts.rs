//! Timeout enforcement.
//!
//! # Responsibilities
//! - Restartable deadline shared by the total-request and read-inactivity timeouts
//! - Heartbeat on forward progress, so a slow but steady producer never times out
//! - Cancel cleanly on every exit path (dropping a deadline cancels it)
//!
//! # Design Decisions
//! - Uses Tokio's `Sleep`, reset in place instead of re-spawning timers
//! - A zero duration disables the deadline entirely; it never fires
//! - A deadline fires at most once and is cleared by firing

use std::future::{poll_fn, Future};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::{Stream, StreamExt};
use tokio::time::{self, Instant, Sleep};

use crate::error::Error;
use crate::observability::metrics;

/// A restartable deadline.
#[derive(Debug)]
pub struct Deadline {
    duration: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl Deadline {
    /// Arm a deadline `duration` from now. A zero duration yields a disabled deadline.
    pub fn start(duration: Duration) -> Self {
        let sleep = (!duration.is_zero()).then(|| Box::pin(time::sleep(duration)));
        Self { duration, sleep }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    /// Cancel permanently. Idempotent.
    pub fn clear(&mut self) {
        self.sleep = None;
    }

    /// Push the deadline back to a full `duration` from now. No-op once cleared.
    ///
    /// A duration too large to represent as an instant disarms the deadline.
    pub fn heartbeat(&mut self) {
        let Some(sleep) = self.sleep.as_mut() else {
            return;
        };
        match Instant::now().checked_add(self.duration) {
            Some(at) => sleep.as_mut().reset(at),
            None => self.sleep = None,
        }
    }

    /// Poll for expiry. Stays pending forever while cleared.
    pub fn poll_expired(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        match self.sleep.as_mut() {
            Some(sleep) => {
                futures_util::ready!(sleep.as_mut().poll(cx));
                self.sleep = None;
                Poll::Ready(())
            }
            None => Poll::Pending,
        }
    }

    /// Resolve once the deadline fires.
    pub async fn expired(&mut self) {
        poll_fn(|cx| self.poll_expired(cx)).await
    }
}

/// Pass-through stream that fails with [`Error::Timeout`] after a period of inactivity.
///
/// Every delivered item is a heartbeat; completion clears the deadline.
#[derive(Debug)]
pub struct ReadTimeout<S> {
    inner: S,
    deadline: Deadline,
    done: bool,
}

impl<S> ReadTimeout<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self {
            inner,
            deadline: Deadline::start(timeout),
            done: false,
        }
    }
}

impl<S, T> Stream for ReadTimeout<S>
where
    S: Stream<Item = Result<T, Error>> + Unpin,
{
    type Item = Result<T, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(item)) => {
                this.deadline.heartbeat();
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => {
                this.deadline.clear();
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => match this.deadline.poll_expired(cx) {
                Poll::Ready(()) => {
                    this.done = true;
                    tracing::warn!(
                        read_timeout_ms = this.deadline.duration().as_millis() as u64,
                        "Stream stalled, aborting read"
                    );
                    metrics::record_timeout("read");
                    Poll::Ready(Some(Err(Error::Timeout)))
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}
