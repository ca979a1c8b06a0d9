//! Work queues that run resolution jobs off the caller's thread.
//!
//! A [`Future`](crate::Future) never spawns threads on its own. It is given an
//! [`Executor`] at construction and every subscription dispatches its single
//! resolution job there. Use [`InlineExecutor`] for deterministic tests,
//! [`WorkerPool`] for a dedicated thread pool, or `TokioExecutor` (feature
//! `tokio`) to borrow a runtime's blocking pool.

use crate::config::PoolConfig;
use crate::error::ExecuteError;
use crossbeam_channel::{Receiver, Sender};
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// A unit of work handed to an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Something that runs jobs, usually asynchronously to the caller.
pub trait Executor: Send + Sync + 'static {
    /// Schedules `job` to run.
    ///
    /// Returns an error if the executor can no longer accept work; the job is
    /// dropped without running in that case.
    fn execute(&self, job: Job) -> Result<(), ExecuteError>;
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, job: Job) -> Result<(), ExecuteError> {
        (**self).execute(job)
    }
}

/// Runs every job immediately on the calling thread.
///
/// `request()` then completes the whole resolution before returning, which
/// makes delivery order fully deterministic in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, job: Job) -> Result<(), ExecuteError> {
        job();
        Ok(())
    }
}

/// A fixed-size pool of worker threads fed from one unbounded queue.
///
/// A job that panics is caught and logged; the worker keeps running.
/// Dropping the pool (or calling [`shutdown`](WorkerPool::shutdown)) stops
/// accepting jobs, lets workers drain what is already queued, and joins them.
pub struct WorkerPool {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    config: PoolConfig,
}

impl WorkerPool {
    /// Spawns the pool's worker threads.
    pub fn new(config: PoolConfig) -> io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(config.workers.get());

        for index in 0..config.workers.get() {
            let mut builder = thread::Builder::new().name(format!("{}-{index}", config.thread_name));
            if let Some(bytes) = config.stack_size {
                builder = builder.stack_size(bytes);
            }
            let receiver = receiver.clone();
            workers.push(builder.spawn(move || run_worker(&receiver))?);
        }

        tracing::debug!(workers = workers.len(), name = %config.thread_name, "worker pool started");

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            config,
        })
    }

    /// Spawns a pool with [`PoolConfig::default`].
    pub fn with_defaults() -> io::Result<Self> {
        Self::new(PoolConfig::default())
    }

    /// Returns the pool's configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Returns `true` once the pool has stopped accepting jobs.
    pub fn is_shut_down(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Stops accepting jobs, waits for queued jobs to finish and joins the
    /// workers.
    ///
    /// Idempotent. When called from one of the pool's own workers, the calling
    /// worker is left to exit on its own instead of joining itself.
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            return;
        }
        // Closing the queue ends each worker's receive loop once it is drained.
        drop(sender);

        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        let current = thread::current().id();
        for worker in workers {
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                tracing::error!("worker thread terminated abnormally");
            }
        }
        tracing::debug!(name = %self.config.thread_name, "worker pool shut down");
    }
}

fn run_worker(receiver: &Receiver<Job>) {
    for job in receiver.iter() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "<non-string panic payload>".to_owned());
            tracing::error!(panic = %message, "job panicked on worker");
        }
    }
}

impl Executor for WorkerPool {
    fn execute(&self, job: Job) -> Result<(), ExecuteError> {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(sender) => sender.send(job).map_err(|_| ExecuteError::ShutDown),
            None => Err(ExecuteError::ShutDown),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(feature = "tokio")]
pub use self::tokio_executor::TokioExecutor;

#[cfg(feature = "tokio")]
mod tokio_executor {
    use super::{ExecuteError, Executor, Job};
    use tokio::runtime::Handle;

    /// Runs jobs on a Tokio runtime's blocking thread pool.
    ///
    /// Jobs are plain closures that may block, so they go to
    /// [`Handle::spawn_blocking`] rather than the async worker threads.
    #[derive(Debug, Clone)]
    pub struct TokioExecutor {
        handle: Handle,
    }

    impl TokioExecutor {
        /// Wraps an explicit runtime handle.
        pub fn new(handle: Handle) -> Self {
            Self { handle }
        }

        /// Wraps the runtime the caller is currently running on.
        ///
        /// Returns `None` outside of a Tokio runtime context.
        pub fn try_current() -> Option<Self> {
            Handle::try_current().ok().map(Self::new)
        }
    }

    impl Executor for TokioExecutor {
        fn execute(&self, job: Job) -> Result<(), ExecuteError> {
            // The JoinHandle is dropped: completion is observed through the
            // job's own callbacks, not by joining.
            drop(self.handle.spawn_blocking(job));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_inline_runs_before_returning() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        InlineExecutor
            .execute(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }))
            .expect("inline executor never refuses");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pool_drains_queue_on_shutdown() {
        let pool = WorkerPool::new(PoolConfig::default().with_workers(2)).expect("spawn pool");
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..100 {
            let c = Arc::clone(&count);
            pool.execute(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }))
            .expect("pool accepts jobs");
        }

        pool.shutdown();
        assert_eq!(count.load(Ordering::SeqCst), 100);
        assert!(pool.is_shut_down());
    }

    #[test]
    fn test_pool_rejects_after_shutdown() {
        let pool = WorkerPool::new(PoolConfig::single_threaded()).expect("spawn pool");
        pool.shutdown();
        pool.shutdown();
        let result = pool.execute(Box::new(|| {}));
        assert_eq!(result, Err(ExecuteError::ShutDown));
    }

    #[test]
    fn test_pool_survives_panicking_job() {
        let pool = WorkerPool::new(PoolConfig::single_threaded()).expect("spawn pool");
        let count = Arc::new(AtomicUsize::new(0));

        pool.execute(Box::new(|| panic!("job failure"))).expect("accepted");
        let c = Arc::clone(&count);
        pool.execute(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }))
        .expect("accepted");

        pool.shutdown();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_worker_thread_names() {
        let pool = WorkerPool::new(PoolConfig::single_threaded().with_thread_name("probe")).expect("spawn pool");
        let (tx, rx) = crossbeam_channel::bounded(1);
        pool.execute(Box::new(move || {
            let _ = tx.send(thread::current().name().map(str::to_owned));
        }))
        .expect("accepted");
        assert_eq!(rx.recv().expect("job ran"), Some("probe-0".to_owned()));
    }
}
