//! Run-once decorator.
//!
//! The first successful call runs the wrapped callable and caches its result;
//! every later call returns that result without running it again.

use crate::application::metrics::Metrics;
use crate::domain::invocation::InvocationCache;
use std::fmt;
use std::marker::PhantomData;

/// A callable that runs its target at most once successfully.
///
/// The target takes a single argument value; pass a tuple to forward several
/// arguments. Arguments of calls after the first are ignored.
///
/// # Example
/// ```
/// use timing_decorators::once;
///
/// let init = once(|(host, port): (&str, u16)| format!("{}:{}", host, port));
///
/// assert_eq!(init.call(("db", 5432)), "db:5432");
/// assert_eq!(init.call(("cache", 6379)), "db:5432");
/// ```
pub struct Once<A, T, F> {
    target: F,
    cache: InvocationCache<T>,
    metrics: Option<Metrics>,
    _args: PhantomData<fn(A)>,
}

/// Wrap `f` so that it runs only on the first call.
///
/// A panic in `f` propagates to the caller and leaves the wrapper unset, so
/// the next call tries again.
pub fn once<A, T, F>(f: F) -> Once<A, T, F>
where
    F: Fn(A) -> T,
{
    Once::new(f)
}

/// Wrap a fallible `f` so that it runs until it first succeeds.
///
/// Use [`Once::try_call`]: `Err` values are returned to the caller and not
/// cached.
pub fn try_once<A, T, E, F>(f: F) -> Once<A, T, F>
where
    F: Fn(A) -> Result<T, E>,
{
    Once::new(f)
}

impl<A, T, F> Once<A, T, F> {
    fn new(target: F) -> Self {
        Self {
            target,
            cache: InvocationCache::new(),
            metrics: None,
            _args: PhantomData,
        }
    }

    /// Record invocations and cache hits into `metrics`.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Whether the target has completed successfully.
    pub fn has_run(&self) -> bool {
        self.cache.has_run()
    }

    /// The cached result, if the target has completed.
    pub fn get(&self) -> Option<&T> {
        self.cache.get()
    }

    fn record(&self, invoked: bool) {
        if let Some(metrics) = &self.metrics {
            if invoked {
                metrics.record_invocation();
            } else {
                metrics.record_cache_hit();
            }
        }
    }
}

impl<A, T, F> Once<A, T, F>
where
    F: Fn(A) -> T,
{
    /// Call the wrapper.
    ///
    /// Runs the target with `args` if it has not completed yet, otherwise
    /// returns the cached result.
    pub fn call(&self, args: A) -> &T {
        let mut invoked = false;
        let result = self.cache.get_or_init(|| {
            invoked = true;
            (self.target)(args)
        });
        self.record(invoked);
        result
    }
}

impl<A, T, E, F> Once<A, T, F>
where
    F: Fn(A) -> Result<T, E>,
{
    /// Call a fallible wrapper.
    ///
    /// An `Ok` result is cached and returned by every later call. An `Err` is
    /// returned to this caller only; the next call runs the target again.
    pub fn try_call(&self, args: A) -> Result<&T, E> {
        let mut invoked = false;
        let result = self.cache.get_or_try_init(|| {
            invoked = true;
            (self.target)(args)
        });
        self.record(invoked);
        result
    }
}

impl<A, T: fmt::Debug, F> fmt::Debug for Once<A, T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Once")
            .field("cached", &self.cache.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::panic;

    #[test]
    fn test_first_call_wins() {
        let g = once(|n: i32| n * 10);
        assert_eq!(*g.call(1), 10);
        assert_eq!(*g.call(2), 10);
        assert_eq!(g.get(), Some(&10));
    }

    #[test]
    fn test_target_runs_exactly_once() {
        let calls = Cell::new(0);
        let g = once(|_: ()| {
            calls.set(calls.get() + 1);
            "ready"
        });

        for _ in 0..5 {
            assert_eq!(*g.call(()), "ready");
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_tuple_arguments_forwarded_in_order() {
        let g = once(|(a, b, c): (i32, &str, bool)| format!("{}-{}-{}", a, b, c));
        assert_eq!(g.call((1, "x", true)), "1-x-true");
    }

    #[test]
    fn test_panic_does_not_poison() {
        let attempts = Cell::new(0);
        let g = once(|n: i32| {
            attempts.set(attempts.get() + 1);
            if n < 0 {
                panic!("negative input");
            }
            n
        });

        let first = panic::catch_unwind(panic::AssertUnwindSafe(|| *g.call(-1)));
        assert!(first.is_err());
        assert!(!g.has_run());

        assert_eq!(*g.call(4), 4);
        assert_eq!(*g.call(8), 4);
        assert_eq!(attempts.get(), 2);
    }

    #[test]
    fn test_try_call_caches_only_success() {
        let attempts = Cell::new(0);
        let g = try_once(|input: &str| {
            attempts.set(attempts.get() + 1);
            input.parse::<u32>()
        });

        assert!(g.try_call("nope").is_err());
        assert!(!g.has_run());

        assert_eq!(g.try_call("12"), Ok(&12));
        assert_eq!(g.try_call("99"), Ok(&12));
        assert_eq!(g.try_call("nope"), Ok(&12));
        assert_eq!(attempts.get(), 2);
    }

    #[test]
    fn test_independent_wrappers() {
        fn double(n: i32) -> i32 {
            n * 2
        }

        let a = once(double);
        let b = once(double);
        assert_eq!(*a.call(1), 2);
        assert_eq!(*b.call(5), 10);
    }

    #[test]
    fn test_metrics() {
        let metrics = Metrics::new();
        let g = once(|n: u8| n).with_metrics(metrics.clone());

        g.call(1);
        g.call(2);
        g.call(3);

        assert_eq!(metrics.invocations(), 1);
        assert_eq!(metrics.cache_hits(), 2);
    }

    #[test]
    fn test_debug_shows_cached_value() {
        let g = once(|n: i32| n);
        assert_eq!(format!("{:?}", g), "Once { cached: None, .. }");
        g.call(3);
        assert_eq!(format!("{:?}", g), "Once { cached: Some(3), .. }");
    }
}
