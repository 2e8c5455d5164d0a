//! Mock timer for testing.

use super::clock::MockClock;
use crate::application::ports::{Clock, Task, Timer, TimerError, TimerHandle};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Timer that runs tasks only when the test advances time.
///
/// Tasks are due at `clock.now() + delay` on the paired [`MockClock`]. Calling
/// [`advance`](Self::advance) runs every task that falls due, in due order,
/// with the clock set to each task's due time while it runs. Tasks scheduled
/// by a running task are honored within the same advance.
///
/// Clones share the same queue. Dropping the last clone drops any tasks that
/// never ran.
///
/// A queued task that captures the owner of this timer keeps both alive. A
/// [`Throttle`](crate::Throttle) dropped with a trailing call still queued is
/// one such owner: its state is freed only once the task runs or
/// [`clear`](Self::clear) discards it.
///
/// # Examples
///
/// ```
/// use timing_decorators::infrastructure::mocks::{MockClock, MockTimer};
/// use timing_decorators::Timer;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::time::{Duration, Instant};
///
/// let timer = MockTimer::new(MockClock::new(Instant::now()));
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&fired);
///
/// timer
///     .schedule(Duration::from_millis(50), Box::new(move || flag.store(true, Ordering::SeqCst)))
///     .unwrap();
///
/// timer.advance(Duration::from_millis(49));
/// assert!(!fired.load(Ordering::SeqCst));
/// timer.advance(Duration::from_millis(1));
/// assert!(fired.load(Ordering::SeqCst));
/// ```
#[derive(Clone, Debug)]
pub struct MockTimer {
    clock: MockClock,
    queue: Arc<Mutex<Queue>>,
}

#[derive(Default)]
struct Queue {
    next_id: u64,
    tasks: BTreeMap<(Instant, u64), Task>,
    due: HashMap<u64, Instant>,
}

impl Queue {
    fn pop_due(&mut self, target: Instant) -> Option<(Instant, Task)> {
        let (due, id) = *self.tasks.keys().next()?;
        if due > target {
            return None;
        }
        self.due.remove(&id);
        self.tasks.remove(&(due, id)).map(|task| (due, task))
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("pending", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl MockTimer {
    /// Create a timer driven by `clock`.
    pub fn new(clock: MockClock) -> Self {
        Self {
            clock,
            queue: Arc::default(),
        }
    }

    /// The clock this timer moves.
    pub fn clock(&self) -> &MockClock {
        &self.clock
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Discard every queued task without running it.
    pub fn clear(&self) {
        let tasks = {
            let mut queue = self.lock();
            queue.due.clear();
            std::mem::take(&mut queue.tasks)
        };
        // Dropped outside the lock; a task's captures may hold this timer.
        drop(tasks);
    }

    /// Move time forward by `by`, running every task that falls due.
    pub fn advance(&self, by: Duration) {
        let target = self.clock.now() + by;

        loop {
            // Release the queue before running so tasks can schedule more work.
            let next = self.lock().pop_due(target);
            let Some((due, task)) = next else { break };

            if due > self.clock.now() {
                self.clock.set(due);
            }
            task();
        }

        self.clock.set(target);
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Timer for MockTimer {
    fn schedule(&self, delay: Duration, task: Task) -> Result<TimerHandle, TimerError> {
        let due = self.clock.now() + delay;
        let mut queue = self.lock();
        let id = queue.next_id;
        queue.next_id += 1;
        queue.tasks.insert((due, id), task);
        queue.due.insert(id, due);
        Ok(TimerHandle::new(id))
    }

    fn cancel(&self, handle: TimerHandle) {
        let mut queue = self.lock();
        if let Some(due) = queue.due.remove(&handle.id()) {
            queue.tasks.remove(&(due, handle.id()));
        }
    }
}
