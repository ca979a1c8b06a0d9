//! pushflow - Back-Pressured Push Protocol with an Exactly-Once Future
//!
//! A minimal reactive-streams core: a [`Source`] pushes values to a [`Sink`]
//! only against the [`Demand`] the sink requested through its
//! [`Subscription`], and ends every subscription with a single
//! [`Completion`].
//!
//! On top of the protocol sits [`Future`], a source that produces at most one
//! value. Its fulfiller runs at most once no matter how many sinks attach or
//! how many threads race to request it, and the result is memoized for every
//! later subscriber.
//!
//! # Key Features
//!
//! - Atomic claim of the fulfiller (no check-then-act window)
//! - Per-subscription demand gate: `request(none)` never starts work
//! - Injected [`Executor`]: inline, worker pool, or Tokio blocking pool
//! - Cooperative, idempotent cancellation with RAII [`CancelGuard`]s
//!
//! # Example
//!
//! ```
//! use pushflow::{Completion, Future, PoolConfig, SourceExt, WorkerPool};
//! use std::sync::{mpsc, Arc};
//!
//! let pool = Arc::new(WorkerPool::new(PoolConfig::default().with_workers(2)).unwrap());
//! let future = Future::<u64, String>::new(Arc::clone(&pool), |promise| {
//!     promise.succeed(6 * 7);
//! });
//!
//! let (tx, rx) = mpsc::channel();
//! let _guard = future.sink(
//!     move |value| tx.send(value).unwrap(),
//!     |completion| assert_eq!(completion, Completion::Finished),
//! );
//! assert_eq!(rx.recv().unwrap(), 42);
//! ```

#[cfg(feature = "tokio")]
mod bridge;
mod cancel;
mod completion;
mod config;
mod connection;
mod demand;
mod erased;
mod error;
mod executor;
mod future;
mod invariants;
mod protocol;
mod sink;
mod sync;

#[cfg(test)]
mod test_utils;

pub use cancel::CancelGuard;
pub use completion::Completion;
pub use config::PoolConfig;
pub use demand::Demand;
pub use erased::{AnySink, AnySource};
pub use error::{AwaitError, DemandError, ExecuteError};
#[cfg(feature = "tokio")]
pub use executor::TokioExecutor;
pub use executor::{Executor, InlineExecutor, Job, WorkerPool};
pub use future::{Future, Promise};
pub use protocol::{Cancellable, Sink, Source, Subscription, SubscriptionHandle};
pub use sink::{ClosureSink, SourceExt};
