//! Memoizing decorator.
//!
//! Results are cached per key in a [`Storage`] table that only grows. A key
//! that is present is never recomputed, whatever its value.

use crate::application::metrics::Metrics;
use crate::application::ports::Storage;
use crate::infrastructure::storage::ShardedStorage;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Key function used by [`memoize`]: the argument is its own key.
pub type IdentityKey<K> = fn(&K) -> K;

/// A callable that caches its target's results by key.
///
/// # Example
/// ```
/// use timing_decorators::memoize;
///
/// let square = memoize(|n: u64| n * n);
/// assert_eq!(square.call(12), 144);
/// assert_eq!(square.call(12), 144);
/// assert_eq!(square.len(), 1);
/// ```
pub struct Memoize<A, K, V, F, H = IdentityKey<K>, S = ShardedStorage<K, V>> {
    target: F,
    key_fn: H,
    table: S,
    metrics: Option<Metrics>,
    _marker: PhantomData<fn(A) -> (K, V)>,
}

/// Cache `f`'s results keyed by its argument.
pub fn memoize<K, V, F>(f: F) -> Memoize<K, K, V, F>
where
    K: Hash + Eq + Clone,
    F: Fn(K) -> V,
{
    Memoize::new(f, K::clone as IdentityKey<K>)
}

/// Cache a fallible `f`'s successful results keyed by its argument.
///
/// Use [`Memoize::try_call`]; `Err` values are not cached.
pub fn try_memoize<K, V, E, F>(f: F) -> Memoize<K, K, V, F>
where
    K: Hash + Eq + Clone,
    F: Fn(K) -> Result<V, E>,
{
    Memoize::new(f, K::clone as IdentityKey<K>)
}

/// Cache `f`'s results under the key computed by `key_fn` from the argument.
///
/// # Example
/// ```
/// use timing_decorators::memoize_by;
///
/// let area = memoize_by(|&(w, h): &(u32, u32)| format!("{}x{}", w, h), |(w, h)| w * h);
/// assert_eq!(area.call((3, 4)), 12);
/// assert!(area.contains_key(&"3x4".to_string()));
/// ```
pub fn memoize_by<A, K, V, F, H>(key_fn: H, f: F) -> Memoize<A, K, V, F, H>
where
    K: Hash + Eq,
    H: Fn(&A) -> K,
    F: Fn(A) -> V,
{
    Memoize::new(f, key_fn)
}

/// Fallible variant of [`memoize_by`].
pub fn try_memoize_by<A, K, V, E, F, H>(key_fn: H, f: F) -> Memoize<A, K, V, F, H>
where
    K: Hash + Eq,
    H: Fn(&A) -> K,
    F: Fn(A) -> Result<V, E>,
{
    Memoize::new(f, key_fn)
}

impl<A, K, V, F, H> Memoize<A, K, V, F, H>
where
    K: Hash + Eq,
{
    fn new(target: F, key_fn: H) -> Self {
        Self {
            target,
            key_fn,
            table: ShardedStorage::new(),
            metrics: None,
            _marker: PhantomData,
        }
    }
}

impl<A, K, V, F, H, S> Memoize<A, K, V, F, H, S> {
    /// Store results in `table` instead of a private [`ShardedStorage`].
    ///
    /// Keys already present in `table` are treated as computed.
    pub fn with_storage<S2>(self, table: S2) -> Memoize<A, K, V, F, H, S2> {
        Memoize {
            target: self.target,
            key_fn: self.key_fn,
            table,
            metrics: self.metrics,
            _marker: PhantomData,
        }
    }

    /// Record invocations and cache hits into `metrics`.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl<A, K, V, F, H, S> Memoize<A, K, V, F, H, S>
where
    K: Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
    H: Fn(&A) -> K,
    S: Storage<K, V>,
{
    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Whether a result is cached under `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.table.contains_key(key)
    }

    fn lookup(&self, args: &A) -> (K, Option<V>) {
        let key = (self.key_fn)(args);
        let cached = self.table.get(&key);
        if cached.is_some() {
            tracing::trace!("memoize cache hit");
            if let Some(metrics) = &self.metrics {
                metrics.record_cache_hit();
            }
        } else if let Some(metrics) = &self.metrics {
            metrics.record_invocation();
        }
        (key, cached)
    }
}

impl<A, K, V, F, H, S> Memoize<A, K, V, F, H, S>
where
    K: Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
    F: Fn(A) -> V,
    H: Fn(&A) -> K,
    S: Storage<K, V>,
{
    /// Call the wrapper.
    ///
    /// Returns the cached value for the argument's key, or runs the target and
    /// caches its result. A panic in the target propagates and caches nothing.
    pub fn call(&self, args: A) -> V {
        match self.lookup(&args) {
            (_, Some(value)) => value,
            (key, None) => {
                let value = (self.target)(args);
                self.table.insert_if_absent(key, value)
            }
        }
    }
}

impl<A, K, V, E, F, H, S> Memoize<A, K, V, F, H, S>
where
    K: Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
    F: Fn(A) -> Result<V, E>,
    H: Fn(&A) -> K,
    S: Storage<K, V>,
{
    /// Call a fallible wrapper.
    ///
    /// `Ok` values are cached; an `Err` is returned and the key stays absent.
    pub fn try_call(&self, args: A) -> Result<V, E> {
        match self.lookup(&args) {
            (_, Some(value)) => Ok(value),
            (key, None) => {
                let value = (self.target)(args)?;
                Ok(self.table.insert_if_absent(key, value))
            }
        }
    }
}

impl<A, K, V, F, H, S: fmt::Debug> fmt::Debug for Memoize<A, K, V, F, H, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoize")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}
