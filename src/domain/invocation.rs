//! Write-once invocation cache.
//!
//! Holds the result of the first successful call of a wrapped callable. The
//! cache is either empty or filled; once filled it never reverts.

use once_cell::sync::OnceCell;

/// Cached result of a single successful invocation.
///
/// Filling the cache is exclusive: when several threads race on an empty cache
/// exactly one initializer runs and the others block until it finishes. If the
/// initializer panics or returns an error the cache stays empty and a later
/// call may try again.
///
/// # Example
/// ```
/// use timing_decorators::InvocationCache;
///
/// let cache = InvocationCache::new();
/// assert!(!cache.has_run());
///
/// assert_eq!(*cache.get_or_init(|| 7), 7);
/// assert_eq!(*cache.get_or_init(|| 99), 7);
/// assert!(cache.has_run());
/// ```
#[derive(Debug)]
pub struct InvocationCache<T> {
    result: OnceCell<T>,
}

impl<T> InvocationCache<T> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            result: OnceCell::new(),
        }
    }

    /// Whether a result has been stored.
    pub fn has_run(&self) -> bool {
        self.result.get().is_some()
    }

    /// The stored result, if any.
    pub fn get(&self) -> Option<&T> {
        self.result.get()
    }

    /// Return the stored result, computing it with `init` if the cache is empty.
    pub fn get_or_init<F>(&self, init: F) -> &T
    where
        F: FnOnce() -> T,
    {
        self.result.get_or_init(init)
    }

    /// Fallible variant of [`get_or_init`](Self::get_or_init).
    ///
    /// An `Err` from `init` is handed back to the caller and nothing is stored.
    pub fn get_or_try_init<F, E>(&self, init: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.result.get_or_try_init(init)
    }
}

impl<T> Default for InvocationCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;

    #[test]
    fn test_empty_cache() {
        let cache: InvocationCache<u32> = InvocationCache::new();
        assert!(!cache.has_run());
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_first_value_wins() {
        let cache = InvocationCache::new();
        assert_eq!(*cache.get_or_init(|| "first"), "first");
        assert_eq!(*cache.get_or_init(|| "second"), "first");
        assert_eq!(cache.get(), Some(&"first"));
    }

    #[test]
    fn test_error_leaves_cache_empty() {
        let cache: InvocationCache<u32> = InvocationCache::new();

        let result: Result<&u32, &str> = cache.get_or_try_init(|| Err("boom"));
        assert_eq!(result, Err("boom"));
        assert!(!cache.has_run());

        let result: Result<&u32, &str> = cache.get_or_try_init(|| Ok(5));
        assert_eq!(result, Ok(&5));
        assert!(cache.has_run());
    }

    #[test]
    fn test_panic_leaves_cache_empty() {
        let cache: InvocationCache<u32> = InvocationCache::new();

        let outcome = panic::catch_unwind(panic::AssertUnwindSafe(|| {
            cache.get_or_init(|| panic!("initializer failed"));
        }));
        assert!(outcome.is_err());
        assert!(!cache.has_run());

        assert_eq!(*cache.get_or_init(|| 3), 3);
    }

    #[test]
    fn test_concurrent_init_runs_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        use std::thread;

        let cache = Arc::new(InvocationCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        for i in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(thread::spawn(move || {
                *cache.get_or_init(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    i
                })
            }));
        }

        let results: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }
}
