//! Mock implementations for testing.
//!
//! Test doubles for the clock and timer ports, plus a tracing layer that
//! captures log events. Available in test builds and with the
//! `test-helpers` feature.

pub mod clock;
pub mod layer;
pub mod timer;

pub use clock::MockClock;
pub use layer::{CapturedEvent, MockCaptureLayer};
pub use timer::MockTimer;
