//! Configuration for the worker pool executor.

use std::num::NonZeroUsize;
use std::thread;

/// Configuration for a [`WorkerPool`](crate::WorkerPool).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads.
    ///
    /// Default: available parallelism, or 4 if it cannot be determined.
    pub workers: NonZeroUsize,

    /// Prefix for worker thread names; each thread gets `"{prefix}-{index}"`.
    ///
    /// Default: `"pushflow-worker"`
    pub thread_name: String,

    /// Stack size for worker threads in bytes, or `None` for the platform
    /// default.
    pub stack_size: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism().unwrap_or(NonZeroUsize::MIN.saturating_add(3)),
            thread_name: "pushflow-worker".to_owned(),
            stack_size: None,
        }
    }
}

impl PoolConfig {
    /// Creates a single-worker configuration. Jobs run one at a time in
    /// submission order.
    pub fn single_threaded() -> Self {
        Self {
            workers: NonZeroUsize::MIN,
            ..Self::default()
        }
    }

    /// Sets the number of workers.
    ///
    /// # Panics
    ///
    /// Panics if `workers` is zero.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = NonZeroUsize::new(workers).expect("worker pool needs at least one worker");
        self
    }

    /// Sets the thread name prefix.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Sets the worker stack size in bytes.
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}
