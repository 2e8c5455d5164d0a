//! Infrastructure layer - adapters for the application ports.
//!
//! This layer provides adapters for:
//! - Clock abstraction (system time, tokio time, mock)
//! - Timer implementations (tokio runtime, mock)
//! - Storage implementations (sharded maps)

pub mod clock;
pub mod storage;

#[cfg(feature = "async")]
pub mod timer;

/// Mock implementations for testing.
///
/// This module is only available when the `test-helpers` feature is enabled,
/// or during test builds. It provides a manually driven clock and timer so
/// cooldown windows and delays can be tested without sleeping.
///
/// To use these mocks in integration tests, add to your `Cargo.toml`:
/// ```toml
/// [dev-dependencies]
/// timing-decorators = { version = "*", features = ["test-helpers"] }
/// ```
#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;
