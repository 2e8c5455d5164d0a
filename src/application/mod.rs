//! Application layer - the decorators themselves.
//!
//! This layer wraps callables and drives the domain logic:
//! - `once` and `memoize` (result caching)
//! - `delay` (a single deferred call)
//! - `throttle` (at most one execution per window)
//! - Metrics shared across decorators
//!
//! ## Ports
//!
//! The application layer defines ports (traits) for time, scheduling and
//! memo storage. Infrastructure adapters implement them, so the decorators
//! never depend on a particular runtime.

pub mod delay;
pub mod memoize;
pub mod metrics;
pub mod once;
pub mod ports;
pub mod throttle;
