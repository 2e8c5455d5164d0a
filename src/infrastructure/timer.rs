//! Timer adapter backed by the tokio runtime.
//!
//! Each scheduled task becomes a spawned tokio task that sleeps for the
//! requested delay and then runs. Cancellation aborts the sleeping task.

use crate::application::ports::{Task, Timer, TimerError, TimerHandle};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Timer that runs tasks on a tokio runtime.
///
/// By default tasks are spawned on the runtime that is current when
/// [`schedule`](Timer::schedule) is called; use [`with_handle`](Self::with_handle)
/// to pin a runtime so scheduling works from threads outside it.
///
/// Clones share the same task table.
#[derive(Debug, Clone, Default)]
pub struct TokioTimer {
    runtime: Option<Handle>,
    inner: Arc<TimerInner>,
}

#[derive(Debug, Default)]
struct TimerInner {
    next_id: AtomicU64,
    tasks: DashMap<u64, AbortHandle>,
}

impl TokioTimer {
    /// Create a timer that uses the runtime current at scheduling time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a timer that always schedules on `runtime`.
    pub fn with_handle(runtime: Handle) -> Self {
        Self {
            runtime: Some(runtime),
            inner: Arc::default(),
        }
    }

    /// Number of tasks that are scheduled and have not started yet.
    pub fn pending(&self) -> usize {
        self.inner.tasks.len()
    }

    fn runtime(&self) -> Result<Handle, TimerError> {
        match &self.runtime {
            Some(handle) => Ok(handle.clone()),
            None => Handle::try_current().map_err(|_| TimerError::NoRuntime),
        }
    }
}

impl Timer for TokioTimer {
    fn schedule(&self, delay: Duration, task: Task) -> Result<TimerHandle, TimerError> {
        let runtime = self.runtime()?;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let deadline = Instant::now() + delay;
        let (registered_tx, registered_rx) = oneshot::channel::<()>();

        let join = runtime.spawn(async move {
            // Wait until the abort handle is in the table, so the removal
            // below always finds it.
            let _ = registered_rx.await;
            tokio::time::sleep_until(deadline).await;
            // Once started, the task can no longer be cancelled.
            inner.tasks.remove(&id);
            task();
        });

        self.inner.tasks.insert(id, join.abort_handle());
        let _ = registered_tx.send(());
        Ok(TimerHandle::new(id))
    }

    fn cancel(&self, handle: TimerHandle) {
        if let Some((_, task)) = self.inner.tasks.remove(&handle.id()) {
            task.abort();
            tracing::trace!(timer = handle.id(), "timer task aborted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_task(counter: &Arc<AtomicUsize>) -> Task {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_no_runtime() {
        let timer = TokioTimer::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let result = timer.schedule(Duration::from_millis(1), counting_task(&counter));
        assert_eq!(result, Err(TimerError::NoRuntime));
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_after_delay() {
        let timer = TokioTimer::new();
        let counter = Arc::new(AtomicUsize::new(0));

        timer
            .schedule(Duration::from_millis(100), counting_task(&counter))
            .unwrap();
        assert_eq!(timer.pending(), 1);

        tokio::time::sleep(Duration::from_millis(99)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(timer.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_run() {
        let timer = TokioTimer::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let handle = timer
            .schedule(Duration::from_millis(50), counting_task(&counter))
            .unwrap();
        timer.cancel(handle);
        assert_eq!(timer.pending(), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        // Cancelling again is harmless
        timer.cancel(handle);
    }

    #[test]
    fn test_immediate_tasks_leave_no_entries() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_time()
            .build()
            .unwrap();
        let timer = TokioTimer::with_handle(runtime.handle().clone());
        let (tx, rx) = std::sync::mpsc::channel();

        for _ in 0..200 {
            let tx = tx.clone();
            timer
                .schedule(
                    Duration::ZERO,
                    Box::new(move || {
                        std::thread::sleep(Duration::from_micros(50));
                        let _ = tx.send(());
                    }),
                )
                .unwrap();
        }
        for _ in 0..200 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }

        assert_eq!(timer.pending(), 0);
    }

    #[test]
    fn test_pinned_runtime_from_plain_thread() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_time()
            .build()
            .unwrap();
        let timer = TokioTimer::with_handle(runtime.handle().clone());
        let (tx, rx) = std::sync::mpsc::channel();

        timer
            .schedule(
                Duration::from_millis(10),
                Box::new(move || {
                    let _ = tx.send("fired");
                }),
            )
            .unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok("fired"));
    }
}
