//! Deferred invocation.
//!
//! Schedules a single future call of a callable on a [`Timer`] and returns
//! immediately. The call cannot be retracted once scheduled. Its result, or
//! its failure, is delivered on a [`DeferredResult`] that the caller may keep
//! or drop.

use crate::application::ports::{Timer, TimerError};
use crate::domain::outcome::{DeferredError, DeferredOutcome};
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tokio::sync::oneshot;

/// Receiving side of a deferred call's outcome.
///
/// Dropping it leaves the call fire-and-forget; the call still runs.
///
/// The outcome is delivered once. After [`try_recv`](Self::try_recv) has
/// returned it, further polls return `None` and the consuming receivers
/// report [`DeferredError::AlreadyReceived`].
#[derive(Debug)]
pub struct DeferredResult<R> {
    rx: Option<oneshot::Receiver<DeferredOutcome<R>>>,
}

impl<R> DeferredResult<R> {
    fn new(rx: oneshot::Receiver<DeferredOutcome<R>>) -> Self {
        Self { rx: Some(rx) }
    }

    /// Check for the outcome without waiting.
    ///
    /// Returns `None` while the call has not run yet, and after the outcome
    /// has been taken.
    pub fn try_recv(&mut self) -> Option<DeferredOutcome<R>> {
        let outcome = match self.rx.as_mut()?.try_recv() {
            Ok(outcome) => outcome,
            Err(oneshot::error::TryRecvError::Empty) => return None,
            Err(oneshot::error::TryRecvError::Closed) => Err(DeferredError::Cancelled),
        };
        self.rx = None;
        Some(outcome)
    }

    /// Whether the outcome has already been taken with `try_recv`.
    pub fn is_received(&self) -> bool {
        self.rx.is_none()
    }

    /// Wait for the outcome.
    pub async fn recv(self) -> DeferredOutcome<R> {
        match self.rx {
            Some(rx) => rx.await.unwrap_or(Err(DeferredError::Cancelled)),
            None => Err(DeferredError::AlreadyReceived),
        }
    }

    /// Block the current thread until the outcome arrives.
    ///
    /// # Panics
    /// Panics when called from within an asynchronous execution context, as
    /// `tokio::sync::oneshot::Receiver::blocking_recv` does.
    pub fn blocking_recv(self) -> DeferredOutcome<R> {
        match self.rx {
            Some(rx) => rx.blocking_recv().unwrap_or(Err(DeferredError::Cancelled)),
            None => Err(DeferredError::AlreadyReceived),
        }
    }
}

/// Run `f(args)` once, no earlier than `wait` from now.
///
/// Returns without blocking. A panic inside the deferred call is caught,
/// logged, and reported on the returned [`DeferredResult`] as
/// [`DeferredError::Panicked`]; it never reaches the caller.
///
/// # Errors
/// Returns a `TimerError` if `timer` cannot schedule the call.
///
/// # Example
/// ```
/// use timing_decorators::delay;
/// use timing_decorators::infrastructure::mocks::{MockClock, MockTimer};
/// use std::time::{Duration, Instant};
///
/// let timer = MockTimer::new(MockClock::new(Instant::now()));
/// let mut result = delay(&timer, Duration::from_millis(100), |(a, b): (i32, i32)| a + b, (2, 3)).unwrap();
///
/// assert!(result.try_recv().is_none());
/// timer.advance(Duration::from_millis(100));
/// assert_eq!(result.try_recv(), Some(Ok(5)));
/// ```
pub fn delay<T, A, R, F>(
    timer: &T,
    wait: Duration,
    f: F,
    args: A,
) -> Result<DeferredResult<R>, TimerError>
where
    T: Timer + ?Sized,
    F: FnOnce(A) -> R + Send + 'static,
    A: Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);

    timer.schedule(
        wait,
        Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(args)))
                .map_err(DeferredError::from_panic);
            if let Err(e) = &outcome {
                tracing::warn!(error = %e, wait_ms, "delayed call failed");
            }
            // The caller may have dropped its DeferredResult.
            let _ = tx.send(outcome);
        }),
    )?;

    tracing::debug!(wait_ms, "delayed call scheduled");
    Ok(DeferredResult::new(rx))
}
