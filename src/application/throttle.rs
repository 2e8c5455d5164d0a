//! Throttling decorator.
//!
//! Coalesces bursts of calls into at most one execution per window. Calls
//! outside a cooldown window run immediately; calls inside it replace one
//! another and the most recent one runs on the trailing edge.

use crate::application::metrics::Metrics;
use crate::application::ports::{Clock, Timer, TimerHandle};
use crate::domain::outcome::{DeferredError, DeferredOutcome};
use crate::domain::throttle::{
    ThrottleConfig, ThrottleConfigError, ThrottleDecision, ThrottlePhase, ThrottleState,
    TrailingEdge,
};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Callback receiving the outcome of every trailing execution.
pub type TrailingHook<R> = Arc<dyn Fn(DeferredOutcome<R>) + Send + Sync>;

type Target<A, R> = Box<dyn Fn(A) -> R + Send + Sync>;

/// A callable that runs its target at most once per window.
///
/// Cloning yields another handle to the same throttle; state is shared
/// between clones but never between separately built throttles.
///
/// # Example
/// ```
/// use timing_decorators::Throttle;
/// use timing_decorators::infrastructure::mocks::{MockClock, MockTimer};
/// use std::sync::Arc;
/// use std::time::{Duration, Instant};
///
/// let clock = MockClock::new(Instant::now());
/// let timer = MockTimer::new(clock.clone());
///
/// let save = Throttle::builder(|doc: &'static str| doc.len())
///     .with_window(Duration::from_millis(100))
///     .with_clock(Arc::new(clock))
///     .with_timer(Arc::new(timer.clone()))
///     .build()
///     .unwrap();
///
/// assert_eq!(save.call("draft 1"), Some(7)); // runs now
/// assert_eq!(save.call("draft 2"), None);    // deferred
/// assert_eq!(save.call("draft 3"), None);    // replaces draft 2
/// assert!(save.is_pending());
///
/// timer.advance(Duration::from_millis(100)); // "draft 3" runs
/// assert!(!save.is_pending());
/// ```
pub struct Throttle<A, R> {
    inner: Arc<ThrottleInner<A, R>>,
}

struct ThrottleInner<A, R> {
    target: Target<A, R>,
    config: ThrottleConfig,
    clock: Arc<dyn Clock>,
    timer: Arc<dyn Timer>,
    state: Mutex<ThrottleState>,
    metrics: Metrics,
    on_trailing: Option<TrailingHook<R>>,
}

/// Wrap `f` so that it runs at most once per `window`, using tokio's clock and
/// the runtime current at call time for trailing executions.
///
/// # Errors
/// Returns `ThrottleConfigError::ZeroWindow` if `window` is zero.
#[cfg(feature = "async")]
pub fn throttle<A, R, F>(f: F, window: Duration) -> Result<Throttle<A, R>, ThrottleConfigError>
where
    F: Fn(A) -> R + Send + Sync + 'static,
    A: Send + 'static,
    R: Send + 'static,
{
    Throttle::builder(f).with_window(window).build()
}

impl<A, R> Throttle<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    /// Start building a throttle around `f`.
    pub fn builder<F>(f: F) -> ThrottleBuilder<A, R>
    where
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        ThrottleBuilder::new(Box::new(f))
    }

    /// Call the wrapper.
    ///
    /// Returns `Some(result)` when the target ran immediately and `None` when
    /// the call was deferred to the trailing edge or dropped. A panic in an
    /// immediate execution propagates to this caller.
    pub fn call(&self, args: A) -> Option<R> {
        let inner = &self.inner;
        let now = inner.clock.now();
        let decision = inner.lock_state().on_call(now, &inner.config);

        match decision {
            ThrottleDecision::Execute { superseded } => {
                if let Some(handle) = superseded {
                    inner.supersede(handle);
                }
                inner.metrics.record_invocation();
                Some((inner.target)(args))
            }
            ThrottleDecision::Defer {
                delay,
                generation,
                superseded,
            } => {
                if let Some(handle) = superseded {
                    inner.supersede(handle);
                }
                ThrottleInner::schedule_trailing(inner, delay, generation, args);
                None
            }
            ThrottleDecision::Discard => {
                tracing::trace!("throttled call discarded");
                None
            }
        }
    }

    /// Current phase of the state machine.
    pub fn phase(&self) -> ThrottlePhase {
        self.inner.lock_state().phase()
    }

    /// Whether a trailing execution is scheduled.
    pub fn is_pending(&self) -> bool {
        self.phase() == ThrottlePhase::CooldownPending
    }

    /// The configuration this throttle was built with.
    pub fn config(&self) -> &ThrottleConfig {
        &self.inner.config
    }

    /// Metrics recorded by this throttle.
    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }
}

impl<A, R> ThrottleInner<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    fn lock_state(&self) -> MutexGuard<'_, ThrottleState> {
        // The target never runs under this lock, so the state is consistent
        // even if a previous holder panicked.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn supersede(&self, handle: TimerHandle) {
        self.timer.cancel(handle);
        self.metrics.record_trailing_superseded();
        tracing::debug!(timer = handle.id(), "trailing call superseded");
    }

    fn schedule_trailing(this: &Arc<Self>, delay: Duration, generation: u64, args: A) {
        let task_inner = Arc::clone(this);
        let scheduled = this.timer.schedule(
            delay,
            Box::new(move || task_inner.fire(generation, args)),
        );

        match scheduled {
            Ok(handle) => {
                this.metrics.record_trailing_scheduled();
                if !this.lock_state().attach(generation, handle) {
                    // Fired or superseded before the handle was recorded.
                    this.timer.cancel(handle);
                }
                tracing::debug!(
                    generation,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "trailing call scheduled"
                );
            }
            Err(e) => {
                this.lock_state().abandon(generation);
                this.metrics.record_deferred_failure();
                tracing::warn!(error = %e, generation, "failed to schedule trailing call");
                this.report(Err(DeferredError::Unscheduled(e)));
            }
        }
    }

    fn fire(&self, generation: u64, args: A) {
        let fire_time = self.clock.now();
        if !self.lock_state().begin_trailing(generation, fire_time) {
            tracing::trace!(generation, "stale trailing call skipped");
            return;
        }

        self.metrics.record_invocation();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.target)(args)))
            .map_err(DeferredError::from_panic);
        if let Err(e) = &outcome {
            self.metrics.record_deferred_failure();
            tracing::warn!(error = %e, generation, "trailing call failed");
        }
        self.report(outcome);
    }

    fn report(&self, outcome: DeferredOutcome<R>) {
        if let Some(hook) = &self.on_trailing {
            hook(outcome);
        }
    }
}

impl<A, R> Clone for Throttle<A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, R> fmt::Debug for Throttle<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttle")
            .field("config", &self.inner.config)
            .field("clock", &self.inner.clock)
            .field("timer", &self.inner.timer)
            .finish_non_exhaustive()
    }
}

/// Builder for constructing a [`Throttle`].
pub struct ThrottleBuilder<A, R> {
    target: Target<A, R>,
    window: Duration,
    trailing: bool,
    trailing_edge: TrailingEdge,
    clock: Option<Arc<dyn Clock>>,
    timer: Option<Arc<dyn Timer>>,
    metrics: Option<Metrics>,
    on_trailing: Option<TrailingHook<R>>,
}

impl<A, R> ThrottleBuilder<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    fn new(target: Target<A, R>) -> Self {
        Self {
            target,
            window: Duration::from_millis(100),
            trailing: true,
            trailing_edge: TrailingEdge::default(),
            clock: None,
            timer: None,
            metrics: None,
            on_trailing: None,
        }
    }

    /// Set the cooldown window.
    ///
    /// Default: 100ms
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Apply every setting of `config`.
    pub fn with_config(mut self, config: ThrottleConfig) -> Self {
        self.window = config.window;
        self.trailing = config.trailing;
        self.trailing_edge = config.trailing_edge;
        self
    }

    /// Enable or disable trailing executions.
    ///
    /// Default: enabled
    pub fn with_trailing(mut self, trailing: bool) -> Self {
        self.trailing = trailing;
        self
    }

    /// Choose when trailing executions fire.
    ///
    /// Default: `TrailingEdge::RemainingCooldown`
    pub fn with_trailing_edge(mut self, edge: TrailingEdge) -> Self {
        self.trailing_edge = edge;
        self
    }

    /// Set a custom clock.
    ///
    /// Default: `TokioClock` with the `async` feature, `SystemClock` otherwise
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the timer used for trailing executions.
    ///
    /// Required unless the `async` feature is enabled, in which case it
    /// defaults to a `TokioTimer` bound to the runtime active at call time.
    pub fn with_timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = Some(timer);
        self
    }

    /// Record into a shared metrics handle instead of a private one.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Receive the result or failure of every trailing execution.
    pub fn on_trailing<F>(mut self, hook: F) -> Self
    where
        F: Fn(DeferredOutcome<R>) + Send + Sync + 'static,
    {
        self.on_trailing = Some(Arc::new(hook));
        self
    }

    /// Build the throttle.
    ///
    /// # Errors
    /// Returns `ThrottleConfigError` if the window is zero or no timer is
    /// available.
    pub fn build(self) -> Result<Throttle<A, R>, ThrottleConfigError> {
        let config = ThrottleConfig::new(self.window)?
            .with_trailing(self.trailing)
            .with_trailing_edge(self.trailing_edge);

        let timer = match self.timer {
            Some(timer) => timer,
            None => default_timer()?,
        };
        let clock = self.clock.unwrap_or_else(default_clock);

        Ok(Throttle {
            inner: Arc::new(ThrottleInner {
                target: self.target,
                config,
                clock,
                timer,
                state: Mutex::new(ThrottleState::new()),
                metrics: self.metrics.unwrap_or_default(),
                on_trailing: self.on_trailing,
            }),
        })
    }
}

#[cfg(feature = "async")]
fn default_clock() -> Arc<dyn Clock> {
    Arc::new(crate::infrastructure::clock::TokioClock::new())
}

#[cfg(not(feature = "async"))]
fn default_clock() -> Arc<dyn Clock> {
    Arc::new(crate::infrastructure::clock::SystemClock::new())
}

#[cfg(feature = "async")]
fn default_timer() -> Result<Arc<dyn Timer>, ThrottleConfigError> {
    Ok(Arc::new(crate::infrastructure::timer::TokioTimer::new()))
}

#[cfg(not(feature = "async"))]
fn default_timer() -> Result<Arc<dyn Timer>, ThrottleConfigError> {
    Err(ThrottleConfigError::MissingTimer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::{MockClock, MockTimer};
    use std::time::Instant;

    struct Harness {
        clock: MockClock,
        timer: MockTimer,
        calls: Arc<Mutex<Vec<u32>>>,
    }

    impl Harness {
        fn new() -> Self {
            let clock = MockClock::new(Instant::now());
            let timer = MockTimer::new(clock.clone());
            Self {
                clock,
                timer,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn builder(&self) -> ThrottleBuilder<u32, u32> {
            let calls = Arc::clone(&self.calls);
            Throttle::builder(move |n: u32| {
                calls.lock().unwrap().push(n);
                n * 10
            })
            .with_window(Duration::from_millis(100))
            .with_clock(Arc::new(self.clock.clone()))
            .with_timer(Arc::new(self.timer.clone()))
        }

        fn calls(&self) -> Vec<u32> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[test]
    fn test_zero_window_rejected() {
        let h = Harness::new();
        let result = h.builder().with_window(Duration::ZERO).build();
        assert!(matches!(result, Err(ThrottleConfigError::ZeroWindow)));
    }

    #[test]
    fn test_no_calls_schedule_nothing() {
        let h = Harness::new();
        let throttled = h.builder().build().unwrap();

        h.timer.advance(Duration::from_secs(5));
        assert!(h.calls().is_empty());
        assert_eq!(h.timer.pending(), 0);
        assert_eq!(throttled.phase(), ThrottlePhase::Idle);
    }

    #[test]
    fn test_burst_of_two() {
        let h = Harness::new();
        let throttled = h.builder().build().unwrap();

        assert_eq!(throttled.call(1), Some(10));
        assert_eq!(throttled.call(2), None);
        assert_eq!(h.calls(), vec![1]);
        assert_eq!(throttled.phase(), ThrottlePhase::CooldownPending);

        h.timer.advance(Duration::from_millis(99));
        assert_eq!(h.calls(), vec![1]);

        h.timer.advance(Duration::from_millis(1));
        assert_eq!(h.calls(), vec![1, 2]);
        assert_eq!(throttled.phase(), ThrottlePhase::Cooling);

        h.timer.advance(Duration::from_secs(1));
        assert_eq!(h.calls(), vec![1, 2]);
    }

    #[test]
    fn test_calls_outside_window_both_run() {
        let h = Harness::new();
        let throttled = h.builder().build().unwrap();

        assert_eq!(throttled.call(1), Some(10));
        h.timer.advance(Duration::from_millis(150));
        assert_eq!(throttled.call(2), Some(20));

        assert_eq!(h.calls(), vec![1, 2]);
        assert_eq!(h.timer.pending(), 0);
    }

    #[test]
    fn test_last_call_wins() {
        let h = Harness::new();
        let throttled = h.builder().build().unwrap();

        throttled.call(1);
        for n in 2..=5 {
            h.timer.advance(Duration::from_millis(10));
            assert_eq!(throttled.call(n), None);
        }
        assert_eq!(h.timer.pending(), 1);

        h.timer.advance(Duration::from_millis(60));
        assert_eq!(h.calls(), vec![1, 5]);

        let snapshot = throttled.metrics().snapshot();
        assert_eq!(snapshot.invocations, 2);
        assert_eq!(snapshot.trailing_scheduled, 4);
        assert_eq!(snapshot.trailing_superseded, 3);
    }

    #[test]
    fn test_at_most_once_per_window() {
        let h = Harness::new();
        let fired_at = Arc::new(Mutex::new(Vec::new()));

        let clock = h.clock.clone();
        let recorder = Arc::clone(&fired_at);
        let timed = Throttle::builder(move |_: ()| recorder.lock().unwrap().push(clock.now()))
            .with_window(Duration::from_millis(100))
            .with_clock(Arc::new(h.clock.clone()))
            .with_timer(Arc::new(h.timer.clone()))
            .build()
            .unwrap();

        for _ in 0..50 {
            timed.call(());
            h.timer.advance(Duration::from_millis(7));
        }
        h.timer.advance(Duration::from_secs(1));

        let times = fired_at.lock().unwrap().clone();
        assert!(times.len() >= 2);
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(100));
        }
    }

    #[test]
    fn test_full_window_edge() {
        let h = Harness::new();
        let throttled = h
            .builder()
            .with_trailing_edge(TrailingEdge::FullWindow)
            .build()
            .unwrap();

        throttled.call(1);
        h.timer.advance(Duration::from_millis(30));
        throttled.call(2);

        h.timer.advance(Duration::from_millis(99));
        assert_eq!(h.calls(), vec![1]);
        h.timer.advance(Duration::from_millis(1));
        assert_eq!(h.calls(), vec![1, 2]);
    }

    #[test]
    fn test_trailing_disabled() {
        let h = Harness::new();
        let throttled = h.builder().with_trailing(false).build().unwrap();

        assert_eq!(throttled.call(1), Some(10));
        assert_eq!(throttled.call(2), None);
        h.timer.advance(Duration::from_secs(1));

        assert_eq!(h.calls(), vec![1]);
        assert_eq!(throttled.call(3), Some(30));
    }

    #[test]
    fn test_trailing_hook_receives_results() {
        let h = Harness::new();
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&outcomes);
        let throttled = h
            .builder()
            .on_trailing(move |outcome| sink.lock().unwrap().push(outcome))
            .build()
            .unwrap();

        throttled.call(1);
        throttled.call(2);
        h.timer.advance(Duration::from_millis(100));

        assert_eq!(*outcomes.lock().unwrap(), vec![Ok(20)]);
    }

    #[test]
    fn test_trailing_panic_is_contained() {
        let clock = MockClock::new(Instant::now());
        let timer = MockTimer::new(clock.clone());
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&outcomes);

        let throttled = Throttle::builder(|n: i32| {
            if n < 0 {
                panic!("negative");
            }
            n
        })
        .with_window(Duration::from_millis(100))
        .with_clock(Arc::new(clock))
        .with_timer(Arc::new(timer.clone()))
        .on_trailing(move |outcome| sink.lock().unwrap().push(outcome))
        .build()
        .unwrap();

        throttled.call(1);
        throttled.call(-1);
        timer.advance(Duration::from_millis(100));

        assert_eq!(
            *outcomes.lock().unwrap(),
            vec![Err(DeferredError::Panicked("negative".to_string()))]
        );
        assert_eq!(throttled.metrics().deferred_failures(), 1);

        // Still usable afterwards
        timer.advance(Duration::from_millis(100));
        assert_eq!(throttled.call(2), Some(2));
    }

    #[test]
    fn test_immediate_panic_propagates() {
        let h = Harness::new();
        let throttled = Throttle::builder(|n: i32| {
            if n < 0 {
                panic!("negative");
            }
            n
        })
        .with_window(Duration::from_millis(100))
        .with_clock(Arc::new(h.clock.clone()))
        .with_timer(Arc::new(h.timer.clone()))
        .build()
        .unwrap();

        let result = panic::catch_unwind(AssertUnwindSafe(|| throttled.call(-1)));
        assert!(result.is_err());

        // The failed call still opened a window
        assert_eq!(throttled.phase(), ThrottlePhase::Cooling);
        assert_eq!(throttled.call(5), None);
        h.timer.advance(Duration::from_millis(100));
        assert_eq!(throttled.phase(), ThrottlePhase::Cooling);
    }

    #[test]
    fn test_independent_throttles() {
        let h = Harness::new();
        let a = h.builder().build().unwrap();
        let b = h.builder().build().unwrap();

        assert_eq!(a.call(1), Some(10));
        assert_eq!(b.call(2), Some(20));
    }

    #[test]
    fn test_clone_shares_state() {
        let h = Harness::new();
        let a = h.builder().build().unwrap();
        let b = a.clone();

        assert_eq!(a.call(1), Some(10));
        assert_eq!(b.call(2), None);
        assert!(a.is_pending());
    }
}
