//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use std::fmt::{self, Debug};
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Port for obtaining current time.
///
/// This abstraction allows the decorators to work with time without depending
/// on system clock implementation details. Infrastructure provides concrete
/// implementations (SystemClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Get the current instant.
    fn now(&self) -> Instant;
}

/// A unit of deferred work handed to a [`Timer`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Opaque handle identifying a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Wrap an adapter-specific task id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The adapter-specific task id.
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Error returned when a timer cannot schedule a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// No async runtime is available to run the task on
    NoRuntime,
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerError::NoRuntime => {
                write!(f, "no async runtime available to schedule on")
            }
        }
    }
}

impl std::error::Error for TimerError {}

/// Port for scheduling deferred work.
///
/// Infrastructure provides concrete implementations (TokioTimer, MockTimer).
pub trait Timer: Send + Sync + Debug {
    /// Run `task` no earlier than `delay` from now.
    ///
    /// # Errors
    /// Returns a `TimerError` if the task cannot be scheduled; the task is
    /// dropped without running.
    fn schedule(&self, delay: Duration, task: Task) -> Result<TimerHandle, TimerError>;

    /// Cancel a scheduled task.
    ///
    /// Cancelling a task that already ran, or is running, has no effect.
    fn cancel(&self, handle: TimerHandle);
}

/// Port for concurrent key-value storage.
///
/// Backs the memo table of [`Memoize`](crate::Memoize). Entries are never
/// removed or overwritten through this port: once a key is present its value
/// is final. Infrastructure provides concrete implementations (ShardedStorage).
pub trait Storage<K, V>: Send + Sync + Debug
where
    K: Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
{
    /// Get a copy of the value stored under `key`.
    fn get(&self, key: &K) -> Option<V>;

    /// Store `value` under `key` unless the key is already present.
    ///
    /// # Returns
    /// The value that is stored under `key` afterwards: the existing one if
    /// another writer got there first, otherwise `value`.
    fn insert_if_absent(&self, key: K, value: V) -> V;

    /// Check whether `key` is present.
    fn contains_key(&self, key: &K) -> bool;

    /// Get the number of entries in the storage.
    fn len(&self) -> usize;

    /// Check if the storage is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
