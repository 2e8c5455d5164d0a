//! Domain layer - pure logic with no runtime dependencies.
//!
//! This layer holds the core concepts the decorators are built from:
//! - Write-once result caching
//! - Outcomes of calls that run later than they were requested
//! - The throttle state machine and its configuration
//! - Collection helpers that accept any callback
//!
//! Nothing here reads a clock or schedules work; callers pass the current
//! time in, which keeps every type easy to test.

pub mod collections;
pub mod invocation;
pub mod outcome;
pub mod throttle;
