//! # timing-decorators
//!
//! Wrap plain callables to control how often and when they run.
//!
//! This crate provides four decorators and a handful of collection helpers:
//!
//! - [`once`]: run the first time, then always return that first result
//! - [`memoize`]: cache results per key, so a key is computed at most once
//! - [`delay`]: schedule a single call for later and return immediately
//! - [`throttle`]: run at most once per cooldown window, keeping the most
//!   recent call for the trailing edge
//!
//! Every decorator forwards a single argument value. Pass a tuple to forward
//! several.
//!
//! ## Quick Start
//!
//! ```rust
//! use timing_decorators::{memoize, once};
//!
//! let connect = once(|url: &str| format!("connected to {}", url));
//! assert_eq!(connect.call("db://primary"), "connected to db://primary");
//! assert_eq!(connect.call("db://replica"), "connected to db://primary");
//!
//! let fib = memoize(|n: u64| (1..=n).fold((0u64, 1u64), |(a, b), _| (b, a + b)).0);
//! assert_eq!(fib.call(50), 12_586_269_025);
//! assert!(fib.contains_key(&50));
//! ```
//!
//! ## Deferred Calls
//!
//! [`delay`] hands the call to a [`Timer`] and returns a [`DeferredResult`].
//! The result channel reports the return value, or a [`DeferredError`] if the
//! call panicked. Dropping the channel leaves the call fire-and-forget.
//!
//! ```rust,no_run
//! use timing_decorators::{delay, TokioTimer};
//! use std::time::Duration;
//!
//! # async fn run() {
//! let timer = TokioTimer::new();
//! let pending = delay(&timer, Duration::from_millis(250), |name: String| name.len(), "report".to_string())
//!     .expect("inside a tokio runtime");
//! assert_eq!(pending.recv().await, Ok(6));
//! # }
//! ```
//!
//! ## Throttling
//!
//! A [`Throttle`] runs its target immediately when it is outside its cooldown
//! window and returns `Some(result)`. Calls inside the window return `None`;
//! the most recent one runs once the window ends. Each execution starts a new
//! window.
//!
//! ```rust,no_run
//! use timing_decorators::{Throttle, TrailingEdge};
//! use std::time::Duration;
//!
//! # async fn run() {
//! let autosave = Throttle::builder(|doc: String| println!("saving {} bytes", doc.len()))
//!     .with_window(Duration::from_secs(2))
//!     .with_trailing_edge(TrailingEdge::RemainingCooldown)
//!     .on_trailing(|outcome| {
//!         if let Err(e) = outcome {
//!             eprintln!("autosave failed: {}", e);
//!         }
//!     })
//!     .build()
//!     .expect("valid config");
//!
//! autosave.call("a".to_string()); // saves now
//! autosave.call("ab".to_string()); // replaced by the next call
//! autosave.call("abc".to_string()); // saved when the window ends
//! # }
//! ```
//!
//! ### Trailing Edge Timing
//!
//! - [`TrailingEdge::RemainingCooldown`] (default): the trailing call runs as
//!   soon as the window opened by the previous execution ends.
//! - [`TrailingEdge::FullWindow`]: the trailing call runs one full window after
//!   it was made.
//!
//! Trailing executions can be disabled with `with_trailing(false)`, in which
//! case calls inside the window are simply dropped.
//!
//! ## Observability
//!
//! All decorators log through `tracing`. Deferred failures are logged at
//! `WARN`; scheduling is logged at `DEBUG` and cache hits at `TRACE`.
//! Attach a [`Metrics`] handle to count invocations, cache hits and trailing
//! calls:
//!
//! ```rust
//! use timing_decorators::{memoize, Metrics};
//!
//! let metrics = Metrics::new();
//! let double = memoize(|n: i32| n * 2).with_metrics(metrics.clone());
//! double.call(1);
//! double.call(1);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.invocations, 1);
//! assert_eq!(snapshot.cache_hits, 1);
//! ```
//!
//! ## Testing
//!
//! Enable the `test-helpers` feature for [`MockClock`](infrastructure::mocks::MockClock)
//! and [`MockTimer`](infrastructure::mocks::MockTimer). They let tests step
//! through cooldown windows and delays without sleeping.
//!
//! ## Feature Flags
//!
//! - `async` (default): [`TokioTimer`], [`TokioClock`] and the [`throttle`]
//!   shorthand
//! - `serde`: serialize and deserialize [`ThrottleConfig`]
//! - `test-helpers`: mock clock, timer and log capture layer

pub mod domain;

pub mod application;

pub mod infrastructure;

pub use domain::{
    collections,
    invocation::InvocationCache,
    outcome::{DeferredError, DeferredOutcome},
    throttle::{
        ThrottleConfig, ThrottleConfigError, ThrottleDecision, ThrottlePhase, ThrottleState,
        TrailingEdge,
    },
};

pub use application::{
    delay::{delay, DeferredResult},
    memoize::{memoize, memoize_by, try_memoize, try_memoize_by, IdentityKey, Memoize},
    metrics::{Metrics, MetricsSnapshot},
    once::{once, try_once, Once},
    ports::{Clock, Storage, Task, Timer, TimerError, TimerHandle},
    throttle::{Throttle, ThrottleBuilder, TrailingHook},
};

#[cfg(feature = "async")]
pub use application::throttle::throttle;

pub use infrastructure::{clock::SystemClock, storage::ShardedStorage};

#[cfg(feature = "async")]
pub use infrastructure::{clock::TokioClock, timer::TokioTimer};
