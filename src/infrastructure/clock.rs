//! Clock adapters for time operations.
//!
//! Provides `SystemClock` for production use, and `TokioClock` (with the
//! `async` feature) for code that also schedules on a `TokioTimer`.
//!
//! # Testing
//!
//! See `MockClock` (in `crate::infrastructure::mocks`) for a controllable test clock.
//! Available with the `test-helpers` feature or in test builds:
//!
//! ```toml
//! [dev-dependencies]
//! timing-decorators = { version = "*", features = ["test-helpers"] }
//! ```

use crate::application::ports::Clock;
use std::time::Instant;

/// System clock implementation using `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that reads tokio's time source.
///
/// Outside a runtime with paused time this is the same as `SystemClock`. When
/// tokio time is paused it follows the paused clock, staying in step with
/// [`TokioTimer`](crate::infrastructure::timer::TokioTimer).
#[cfg(feature = "async")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[cfg(feature = "async")]
impl TokioClock {
    /// Create a new tokio clock.
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "async")]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}
