//! Bounded worker pool for store calls
//!
//! Store operations are blocking (they may wait on the coordinator), so the
//! pool runs them on the blocking threads of a dedicated tokio runtime,
//! capped at `workers`. Callers get a [`TaskHandle`] they can await, block
//! on, or cancel.

use crate::errors::{Result, StoreError};
use parking_lot::{Condvar, Mutex};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Cancellation token for coordinated shutdown
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        // Register before checking the flag so a concurrent cancel is not missed.
        let notified = self.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// Count of submitted tasks that have not finished yet
#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn enter(self: &Arc<Self>) -> InFlightGuard {
        *self.count.lock() += 1;
        InFlightGuard(self.clone())
    }

    fn current(&self) -> usize {
        *self.count.lock()
    }

    /// Wait until nothing is in flight or `deadline` passes. Returns the
    /// number still running.
    fn wait_idle(&self, deadline: Instant) -> usize {
        let mut count = self.count.lock();
        while *count > 0 {
            if self.idle.wait_until(&mut count, deadline).timed_out() {
                break;
            }
        }
        *count
    }
}

struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut count = self.0.count.lock();
        *count -= 1;
        if *count == 0 {
            self.0.idle.notify_all();
        }
    }
}

/// Deferred result of a submitted task
pub struct TaskHandle<T> {
    inner: JoinHandle<Result<T>>,
}

impl<T> TaskHandle<T> {
    /// Cancel the task. Takes effect only if it has not started; a running
    /// store call completes and releases its acquisition normally.
    pub fn cancel(&self) {
        self.inner.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Block the current thread until the task resolves.
    pub fn join(self) -> Result<T> {
        futures::executor::block_on(self)
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.inner).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(err)) if err.is_cancelled() => Poll::Ready(Err(StoreError::Cancelled)),
            Poll::Ready(Err(err)) => Poll::Ready(Err(StoreError::TaskFailed(panic_message(err)))),
        }
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "task panicked".to_string()),
        Err(err) => err.to_string(),
    }
}

pub struct WorkerPool {
    runtime: Mutex<Option<Runtime>>,
    token: CancellationToken,
    in_flight: Arc<InFlight>,
    workers: usize,
}

impl WorkerPool {
    /// Pool with `workers` blocking threads (0 = available parallelism).
    pub fn new(workers: usize) -> Result<Self> {
        let workers = if workers == 0 { default_workers() } else { workers };
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name("material-store-worker")
            .enable_all()
            .build()?;

        debug!(workers, "worker pool started");
        Ok(Self {
            runtime: Mutex::new(Some(runtime)),
            token: CancellationToken::new(),
            in_flight: Arc::new(InFlight::default()),
            workers,
        })
    }

    /// Run `job` on a pool thread.
    ///
    /// Fails with `IllegalState` once the pool is shut down. A job still
    /// queued when shutdown cancels the pool resolves to `Cancelled`.
    pub fn submit<T, F>(&self, job: F) -> Result<TaskHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let runtime = self.runtime.lock();
        let runtime = runtime.as_ref().ok_or_else(|| StoreError::closed("worker pool"))?;

        let token = self.token.clone();
        let guard = self.in_flight.enter();
        let inner = runtime.spawn_blocking(move || {
            let _guard = guard;
            if token.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            job()
        });
        Ok(TaskHandle { inner })
    }

    /// Spawn an async background task that runs until the pool shuts down.
    pub(crate) fn spawn_background<F>(&self, task: impl FnOnce(CancellationToken) -> F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let runtime = self.runtime.lock();
        let runtime = runtime.as_ref().ok_or_else(|| StoreError::closed("worker pool"))?;
        runtime.spawn(task(self.token.clone()));
        Ok(())
    }

    /// Stop accepting work, give in-flight tasks up to `grace` to finish,
    /// then cancel whatever is left. Idempotent.
    ///
    /// Returns the number of tasks that were still running at the deadline.
    pub fn shutdown(&self, grace: Duration) -> usize {
        let Some(runtime) = self.runtime.lock().take() else {
            return 0;
        };

        let pending = self.in_flight.current();
        info!(pending, grace_ms = grace.as_millis() as u64, "worker pool draining");

        let remaining = self.in_flight.wait_idle(Instant::now() + grace);
        self.token.cancel();
        if remaining > 0 {
            warn!(remaining, "grace period expired, cancelling remaining tasks");
        }
        runtime.shutdown_background();
        remaining
    }

    pub fn is_shut_down(&self) -> bool {
        self.runtime.lock().is_none()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.current()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.get_mut().take() {
            self.token.cancel();
            runtime.shutdown_background();
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
