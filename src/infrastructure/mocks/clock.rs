//! Mock clock for testing.

use crate::application::ports::Clock;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Manually driven clock.
///
/// Time only moves when a test calls [`advance`](Self::advance) or
/// [`set`](Self::set), which makes cooldown windows and delays deterministic.
/// Usually paired with [`MockTimer`](super::MockTimer), which moves the clock
/// as it runs due tasks.
///
/// # Examples
///
/// ```
/// use timing_decorators::infrastructure::mocks::MockClock;
/// use timing_decorators::Clock;
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let clock = MockClock::new(start);
/// assert_eq!(clock.now(), start);
///
/// clock.advance(Duration::from_millis(250));
/// assert_eq!(clock.elapsed_since(start), Duration::from_millis(250));
/// ```
///
/// Clones share the same time value, so a clone handed to a throttle sees
/// every advance made through the original.
#[derive(Debug, Clone)]
pub struct MockClock {
    current_time: Arc<Mutex<Instant>>,
}

impl MockClock {
    /// Create a mock clock starting at a specific instant.
    pub fn new(start: Instant) -> Self {
        Self {
            current_time: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        *self.lock() += duration;
    }

    /// Set the clock to a specific instant.
    ///
    /// Moving backwards is allowed; it is up to the test to keep time sane.
    pub fn set(&self, instant: Instant) {
        *self.lock() = instant;
    }

    /// Time elapsed between `earlier` and the current mock time.
    pub fn elapsed_since(&self, earlier: Instant) -> Duration {
        self.lock().saturating_duration_since(earlier)
    }

    fn lock(&self) -> MutexGuard<'_, Instant> {
        self.current_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.lock()
    }
}
