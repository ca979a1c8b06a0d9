//! A source that produces at most one value, computed at most once.
//!
//! The memo cell moves through three states, all transitions taken under one
//! lock:
//!
//! ```text
//! Unclaimed(fulfiller) ──claim──▶ InFlight(waiters) ──fulfill──▶ Ready(result)
//!                                        │
//!                                        └──promise dropped──▶ Abandoned
//! ```
//!
//! The first `resolve` swaps `Unclaimed` for `InFlight` and takes the
//! fulfiller out in the same critical section, so no second caller can ever
//! observe an unclaimed memo once the first has seen it. Concurrent callers
//! arriving while the memo is `InFlight` are queued and drained when the
//! promise is fulfilled. No lock is held while the fulfiller or any callback
//! runs.

use crate::connection::Connection;
use crate::erased::AnySink;
use crate::executor::Executor;
#[cfg(debug_assertions)]
use crate::invariants::debug_assert_claimed;
use crate::protocol::{Sink, Source, SubscriptionHandle};
use crate::sync::{lock, Arc, Mutex};
use std::fmt;
use std::mem;

type Fulfiller<O, F> = Box<dyn FnOnce(Promise<O, F>) + Send>;
pub(crate) type Waiter<O, F> = Box<dyn FnOnce(Result<O, F>) + Send>;

enum Memo<O, F> {
    Unclaimed(Fulfiller<O, F>),
    InFlight(Vec<(Option<u64>, Waiter<O, F>)>),
    Ready(Result<O, F>),
    Abandoned,
}

impl<O, F> Memo<O, F> {
    fn name(&self) -> &'static str {
        match self {
            Self::Unclaimed(_) => "unclaimed",
            Self::InFlight(_) => "in_flight",
            Self::Ready(_) => "ready",
            Self::Abandoned => "abandoned",
        }
    }
}

struct Shared<O, F> {
    memo: Mutex<Memo<O, F>>,
}

/// A source that eventually produces a single value and then finishes, or
/// fails.
///
/// The fulfiller passed to [`Future::new`] is invoked **at most once** over
/// the whole lifetime of the future, no matter how many sinks attach or how
/// many threads race to request it. Its result is memoized: every subscription
/// (including ones created after resolution) observes the identical result.
///
/// Cloning a `Future` is cheap and shares the memo.
///
/// # Example
///
/// ```
/// use pushflow::{Completion, Future, InlineExecutor, SourceExt};
/// use std::sync::{Arc, Mutex};
///
/// let future = Future::<u32, String>::new(InlineExecutor, |promise| promise.succeed(42));
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let values = Arc::clone(&seen);
/// let _guard = future.sink(
///     move |v| values.lock().unwrap().push(v),
///     |completion| assert_eq!(completion, Completion::Finished),
/// );
/// assert_eq!(*seen.lock().unwrap(), vec![42]);
/// ```
pub struct Future<O, F> {
    shared: Arc<Shared<O, F>>,
    executor: std::sync::Arc<dyn Executor>,
}

impl<O, F> Future<O, F>
where
    O: Clone + Send + 'static,
    F: Clone + Send + 'static,
{
    /// Creates a future that will run `fulfiller` on first demand.
    ///
    /// `fulfiller` receives a [`Promise`] and must eventually fulfill it,
    /// possibly from another thread. Resolution jobs run on `executor`.
    pub fn new<E, P>(executor: E, fulfiller: P) -> Self
    where
        E: Executor,
        P: FnOnce(Promise<O, F>) + Send + 'static,
    {
        Self::with_memo(executor, Memo::Unclaimed(Box::new(fulfiller)))
    }

    /// Creates a future whose result is already known.
    pub fn ready<E: Executor>(executor: E, result: Result<O, F>) -> Self {
        Self::with_memo(executor, Memo::Ready(result))
    }

    /// Creates a future that succeeds with `value`.
    pub fn succeeded<E: Executor>(executor: E, value: O) -> Self {
        Self::ready(executor, Ok(value))
    }

    /// Creates a future that fails with `error`.
    pub fn failed<E: Executor>(executor: E, error: F) -> Self {
        Self::ready(executor, Err(error))
    }

    fn with_memo<E: Executor>(executor: E, memo: Memo<O, F>) -> Self {
        Self {
            shared: Arc::new(Shared {
                memo: Mutex::new(memo),
            }),
            executor: std::sync::Arc::new(executor),
        }
    }

    /// Registers interest in the eventual result.
    ///
    /// * If the result is memoized, `on_done` runs immediately on the calling
    ///   thread.
    /// * If resolution is in flight, `on_done` is queued and runs on whichever
    ///   thread fulfills the promise.
    /// * Otherwise this call claims the fulfiller and invokes it on the calling
    ///   thread.
    ///
    /// If the fulfiller drops its promise without fulfilling it, `on_done` is
    /// dropped without being called.
    pub fn resolve<C>(&self, on_done: C)
    where
        C: FnOnce(Result<O, F>) + Send + 'static,
    {
        self.resolve_boxed(None, Box::new(on_done));
    }

    /// Registers `on_done`, tagged with `key` when the caller may later
    /// withdraw it through [`forget`](Self::forget).
    pub(crate) fn resolve_boxed(&self, key: Option<u64>, on_done: Waiter<O, F>) {
        let mut memo = lock(&self.shared.memo);
        // The memoized result is cloned in place: a panicking `Clone` must not
        // leave the memo half-replaced.
        if let Memo::Ready(result) = &*memo {
            let cached = result.clone();
            drop(memo);
            tracing::trace!("resolved from memo");
            on_done(cached);
            return;
        }

        match mem::replace(&mut *memo, Memo::Abandoned) {
            Memo::InFlight(mut waiters) => {
                waiters.push((key, on_done));
                tracing::trace!(waiters = waiters.len(), "queued behind in-flight resolution");
                *memo = Memo::InFlight(waiters);
            }
            Memo::Unclaimed(fulfiller) => {
                // Claim and release in one critical section: nobody else can
                // see `Unclaimed` from here on.
                *memo = Memo::InFlight(vec![(key, on_done)]);
                drop(memo);
                tracing::debug!("fulfiller claimed");
                fulfiller(Promise {
                    shared: Some(Arc::clone(&self.shared)),
                });
            }
            Memo::Abandoned => {
                drop(memo);
                tracing::warn!("resolve on a future whose promise was abandoned");
                drop(on_done);
            }
            Memo::Ready(_) => unreachable!("ready memo handled above"),
        }
    }

    /// Withdraws the queued waiter registered under `key`, if it is still
    /// waiting. Returns `true` if one was removed.
    pub(crate) fn forget(&self, key: u64) -> bool {
        let removed = {
            let mut memo = lock(&self.shared.memo);
            match &mut *memo {
                Memo::InFlight(waiters) => waiters
                    .iter()
                    .position(|(k, _)| *k == Some(key))
                    .map(|index| waiters.remove(index)),
                _ => None,
            }
        };
        // Dropped outside the lock: the waiter may release a subscription.
        let found = removed.is_some();
        drop(removed);
        if found {
            tracing::trace!(key, "waiter withdrawn");
        }
        found
    }

    #[cfg(test)]
    pub(crate) fn waiting(&self) -> usize {
        match &*lock(&self.shared.memo) {
            Memo::InFlight(waiters) => waiters.len(),
            _ => 0,
        }
    }

    /// Returns `true` once the result has been memoized.
    pub fn is_resolved(&self) -> bool {
        matches!(*lock(&self.shared.memo), Memo::Ready(_))
    }

    /// Returns a clone of the memoized result, if resolution has completed.
    ///
    /// Never triggers the fulfiller.
    pub fn peek(&self) -> Option<Result<O, F>> {
        match &*lock(&self.shared.memo) {
            Memo::Ready(result) => Some(result.clone()),
            _ => None,
        }
    }

    pub(crate) fn executor(&self) -> &dyn Executor {
        &*self.executor
    }
}

impl<O, F> Clone for Future<O, F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            executor: std::sync::Arc::clone(&self.executor),
        }
    }
}

impl<O, F> fmt::Debug for Future<O, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("memo", &lock(&self.shared.memo).name())
            .finish_non_exhaustive()
    }
}

impl<O, F> Source for Future<O, F>
where
    O: Clone + Send + 'static,
    F: Clone + Send + 'static,
{
    type Output = O;
    type Failure = F;

    fn attach<S>(&self, sink: S) -> SubscriptionHandle
    where
        S: Sink<Input = O, Failure = F>,
    {
        Connection::open(self.clone(), AnySink::new(sink))
    }
}

/// The one-shot completion handle passed to a [`Future`]'s fulfiller.
///
/// Fulfilling consumes the promise, so a result can be supplied at most once.
/// Dropping a promise without fulfilling it abandons the future: queued
/// subscribers are released without a completion and later resolves are
/// ignored.
#[must_use = "a dropped Promise abandons every subscriber of its future"]
pub struct Promise<O, F> {
    shared: Option<Arc<Shared<O, F>>>,
}

impl<O, F> Promise<O, F>
where
    O: Clone,
    F: Clone,
{
    /// Stores `result` in the memo and hands it to every queued subscriber.
    pub fn fulfill(mut self, result: Result<O, F>) {
        let Some(shared) = self.shared.take() else {
            return;
        };

        let waiters = {
            let mut memo = lock(&shared.memo);
            match mem::replace(&mut *memo, Memo::Ready(result.clone())) {
                Memo::InFlight(waiters) => waiters,
                previous => {
                    #[cfg(debug_assertions)]
                    debug_assert_claimed!(false);
                    *memo = previous;
                    return;
                }
            }
        };

        tracing::debug!(
            waiters = waiters.len(),
            ok = result.is_ok(),
            "future resolved"
        );
        for (_, waiter) in waiters {
            waiter(result.clone());
        }
    }

    /// Fulfills with a value.
    pub fn succeed(self, value: O) {
        self.fulfill(Ok(value));
    }

    /// Fulfills with an error.
    pub fn fail(self, error: F) {
        self.fulfill(Err(error));
    }
}

impl<O, F> Drop for Promise<O, F> {
    fn drop(&mut self) {
        let Some(shared) = self.shared.take() else {
            return;
        };
        let mut memo = lock(&shared.memo);
        let waiters = match mem::replace(&mut *memo, Memo::Abandoned) {
            Memo::InFlight(waiters) => waiters,
            previous => {
                *memo = previous;
                return;
            }
        };
        drop(memo);

        tracing::warn!(
            waiters = waiters.len(),
            "promise dropped without being fulfilled; releasing subscribers"
        );
        // Dropped outside the lock: waiters release their connections.
        drop(waiters);
    }
}

impl<O, F> fmt::Debug for Promise<O, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("pending", &self.shared.is_some())
            .finish()
    }
}
