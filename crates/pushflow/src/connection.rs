//! Per-subscription state machine between a sink and a [`Future`].

use crate::completion::Completion;
use crate::demand::Demand;
use crate::erased::AnySink;
use crate::future::Future;
#[cfg(debug_assertions)]
use crate::invariants::{debug_assert_demand_granted, debug_assert_state_advances};
use crate::protocol::{Cancellable, Sink, Subscription, SubscriptionHandle};
use crate::sync::{lock, AtomicBool, Mutex, Ordering};
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Weak};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Resolution progress of one subscription. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum ResolveState {
    Pending,
    Resolving,
    Resolved,
}

/// The subscription handed out by [`Future::attach`](crate::Source::attach).
///
/// The first non-zero `request` moves `Pending → Resolving` and dispatches a
/// single job on the future's executor; the job asks the future to resolve
/// and, when the result arrives, moves to `Resolved` and delivers to the sink.
/// Later requests are no-ops: a future produces one value no matter how much
/// demand arrives.
///
/// `cancel` is cooperative. A job that has not started yet never resolves,
/// and delivery is never started once cancellation is observed. A delivery
/// already underway when `cancel` is called still runs to its end: the sink
/// may see its value and completion moments after cancelling.
pub(crate) struct Connection<O, F> {
    id: u64,
    future: Future<O, F>,
    state: Mutex<ResolveState>,
    sink: Mutex<Option<AnySink<O, F>>>,
    cancelled: AtomicBool,
    this: Weak<Self>,
}

impl<O, F> Connection<O, F>
where
    O: Clone + Send + 'static,
    F: Clone + Send + 'static,
{
    /// Creates the connection, hands it to the sink and returns it.
    pub(crate) fn open(future: Future<O, F>, sink: AnySink<O, F>) -> SubscriptionHandle {
        let connection = Arc::new_cyclic(|this| Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            future,
            state: Mutex::new(ResolveState::Pending),
            sink: Mutex::new(Some(sink.clone())),
            cancelled: AtomicBool::new(false),
            this: this.clone(),
        });
        tracing::trace!(subscription = connection.id, "subscription opened");

        let handle: SubscriptionHandle = connection;
        // The sink may request (and, on an inline executor, receive its
        // result) from inside on_subscribe, so no lock is held here.
        sink.on_subscribe(Arc::clone(&handle));
        handle
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> ResolveState {
        *lock(&self.state)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Moves to `Resolved`, returning the state it left.
    fn mark_resolved(&self) -> ResolveState {
        let mut state = lock(&self.state);
        let previous = *state;
        #[cfg(debug_assertions)]
        debug_assert_state_advances!(previous, ResolveState::Resolved);
        *state = ResolveState::Resolved;
        previous
    }

    fn take_sink(&self) -> Option<AnySink<O, F>> {
        lock(&self.sink).take()
    }

    fn start(self: Arc<Self>, delivery: Delivery<O, F>) {
        if self.is_cancelled() {
            tracing::trace!(subscription = self.id, "cancelled before resolution started");
            return;
        }
        tracing::trace!(subscription = self.id, "resolution job started");
        self.future
            .resolve_boxed(Some(self.id), Box::new(move |result| delivery.finish(result)));

        // A cancel that raced past the check above found nothing to withdraw;
        // withdraw the waiter queued just now instead.
        if self.is_cancelled() {
            self.future.forget(self.id);
        }
    }

    fn finish(&self, result: Result<O, F>) {
        let previous = self.mark_resolved();
        #[cfg(debug_assertions)]
        debug_assert_demand_granted!(previous);

        let Some(sink) = self.take_sink() else {
            tracing::trace!(subscription = self.id, ?previous, "result arrived after sink was released");
            return;
        };
        if self.is_cancelled() {
            tracing::trace!(subscription = self.id, "result dropped: subscription cancelled");
            return;
        }

        match result {
            Ok(value) => {
                let demand = sink.on_value(value);
                tracing::trace!(subscription = self.id, %demand, "value delivered");
                sink.on_completion(Completion::Finished);
            }
            Err(error) => {
                sink.on_completion(Completion::Failed(error));
            }
        }
        tracing::debug!(subscription = self.id, "subscription completed");
    }

    fn abandon(&self) {
        self.mark_resolved();
        if self.take_sink().is_some() {
            tracing::debug!(subscription = self.id, "subscription abandoned without a result");
        }
    }
}

impl<O, F> Subscription for Connection<O, F>
where
    O: Clone + Send + 'static,
    F: Clone + Send + 'static,
{
    fn request(&self, demand: Demand) {
        if demand.is_none() {
            return;
        }
        if self.is_cancelled() {
            tracing::trace!(subscription = self.id, %demand, "request ignored: cancelled");
            return;
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };

        {
            let mut state = lock(&self.state);
            if *state != ResolveState::Pending {
                return;
            }
            *state = ResolveState::Resolving;
        }

        tracing::debug!(subscription = self.id, %demand, "dispatching resolution");
        let delivery = Delivery {
            connection: Some(Arc::clone(&this)),
        };
        let job = Box::new(move || this.start(delivery));
        if let Err(e) = self.future.executor().execute(job) {
            // The refused job was dropped, and its delivery with it, which
            // already released the sink.
            tracing::error!(subscription = self.id, error = %e, "failed to dispatch resolution");
        }
    }
}

impl<O, F> Cancellable for Connection<O, F>
where
    O: Clone + Send + 'static,
    F: Clone + Send + 'static,
{
    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        let released = lock(&self.sink).take();
        // Without this the waiter, and the connection it owns, would stay
        // queued until the promise is fulfilled.
        let withdrawn = self.future.forget(self.id);
        tracing::debug!(
            subscription = self.id,
            released = released.is_some(),
            withdrawn,
            "subscription cancelled"
        );
    }
}

impl<O, F> fmt::Debug for Connection<O, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &*lock(&self.state))
            .field("cancelled", &self.cancelled.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// The connection's claim on a result.
///
/// Either `finish` consumes it with the result, or it is dropped unused (the
/// executor refused the job, the job saw cancellation, or the promise was
/// abandoned) and the connection is released without a completion.
struct Delivery<O, F>
where
    O: Clone + Send + 'static,
    F: Clone + Send + 'static,
{
    connection: Option<Arc<Connection<O, F>>>,
}

impl<O, F> Delivery<O, F>
where
    O: Clone + Send + 'static,
    F: Clone + Send + 'static,
{
    fn finish(mut self, result: Result<O, F>) {
        if let Some(connection) = self.connection.take() {
            connection.finish(result);
        }
    }
}

impl<O, F> Drop for Delivery<O, F>
where
    O: Clone + Send + 'static,
    F: Clone + Send + 'static,
{
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.abandon();
        }
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use crate::error::ExecuteError;
    use crate::executor::{Executor, InlineExecutor, Job};
    use crate::protocol::Source;
    use crate::test_utils::{Recorded, RecordingSink};
    use std::sync::Mutex as StdMutex;

    /// Holds jobs until the test runs them.
    #[derive(Default)]
    struct ManualExecutor {
        jobs: StdMutex<Vec<Job>>,
        refuse: bool,
    }

    impl ManualExecutor {
        fn run_all(&self) -> usize {
            let jobs = std::mem::take(&mut *self.jobs.lock().unwrap());
            let n = jobs.len();
            for job in jobs {
                job();
            }
            n
        }
    }

    impl Executor for ManualExecutor {
        fn execute(&self, job: Job) -> Result<(), ExecuteError> {
            if self.refuse {
                return Err(ExecuteError::ShutDown);
            }
            self.jobs.lock().unwrap().push(job);
            Ok(())
        }
    }

    fn immediate(value: u32) -> Future<u32, String> {
        Future::new(InlineExecutor, move |p| p.succeed(value))
    }

    #[test]
    fn test_request_none_never_resolves() {
        let (sink, log) = RecordingSink::new(Demand::NONE);
        let future = immediate(1);
        let handle = future.attach(sink);
        for _ in 0..10 {
            handle.request(Demand::NONE);
        }
        assert!(!future.is_resolved());
        assert_eq!(log.events(), vec![Recorded::Subscribed]);
    }

    #[test]
    fn test_value_then_finished() {
        let (sink, log) = RecordingSink::new(Demand::max(1));
        let _handle = immediate(42).attach(sink);
        assert_eq!(
            log.events(),
            vec![
                Recorded::Subscribed,
                Recorded::Value(42),
                Recorded::Completion(Completion::Finished)
            ]
        );
    }

    #[test]
    fn test_failure_delivers_only_completion() {
        let (sink, log) = RecordingSink::new(Demand::UNLIMITED);
        let future = Future::<u32, String>::new(InlineExecutor, |p| p.fail("E1".into()));
        let _handle = future.attach(sink);
        assert_eq!(
            log.events(),
            vec![
                Recorded::Subscribed,
                Recorded::Completion(Completion::Failed("E1".into()))
            ]
        );
    }

    #[test]
    fn test_duplicate_requests_dispatch_once() {
        let executor = Arc::new(ManualExecutor::default());
        let future = Future::<u32, String>::new(Arc::clone(&executor), |p| p.succeed(5));
        let (sink, log) = RecordingSink::new(Demand::NONE);
        let handle = future.attach(sink);

        handle.request(Demand::max(1));
        handle.request(Demand::UNLIMITED);
        handle.request(Demand::max(3));
        assert_eq!(executor.run_all(), 1);

        handle.request(Demand::max(1));
        assert_eq!(executor.run_all(), 0);
        assert_eq!(log.values(), vec![5]);
        assert_eq!(log.completions(), 1);
    }

    #[test]
    fn test_state_is_monotonic() {
        let executor = Arc::new(ManualExecutor::default());
        let future = Future::<u32, String>::new(Arc::clone(&executor), |p| p.succeed(5));
        let connection = Arc::new_cyclic(|this| Connection {
            id: 0,
            future,
            state: Mutex::new(ResolveState::Pending),
            sink: Mutex::new(Some(AnySink::new(RecordingSink::new(Demand::NONE).0))),
            cancelled: AtomicBool::new(false),
            this: this.clone(),
        });

        assert_eq!(connection.state(), ResolveState::Pending);
        connection.request(Demand::max(1));
        assert_eq!(connection.state(), ResolveState::Resolving);
        executor.run_all();
        assert_eq!(connection.state(), ResolveState::Resolved);
        connection.request(Demand::max(1));
        assert_eq!(connection.state(), ResolveState::Resolved);
    }

    #[test]
    fn test_cancel_before_job_starts_skips_resolution() {
        let executor = Arc::new(ManualExecutor::default());
        let future = Future::<u32, String>::new(Arc::clone(&executor), |p| p.succeed(5));
        let (sink, log) = RecordingSink::new(Demand::NONE);
        let handle = future.attach(sink);

        handle.request(Demand::UNLIMITED);
        handle.cancel();
        handle.cancel();
        executor.run_all();

        assert!(!future.is_resolved());
        assert_eq!(log.events(), vec![Recorded::Subscribed]);
    }

    #[test]
    fn test_cancel_while_in_flight_suppresses_delivery() {
        let parked = Arc::new(StdMutex::new(None));
        let slot = Arc::clone(&parked);
        let future = Future::<u32, String>::new(InlineExecutor, move |p| {
            *slot.lock().unwrap() = Some(p);
        });
        let (sink, log) = RecordingSink::new(Demand::UNLIMITED);
        let handle = future.attach(sink);
        handle.cancel();

        let promise = parked.lock().unwrap().take().expect("fulfiller ran");
        promise.succeed(9);

        // The memo is populated for everyone else; this sink sees nothing.
        assert_eq!(future.peek(), Some(Ok(9)));
        assert_eq!(log.events(), vec![Recorded::Subscribed]);
    }

    #[test]
    fn test_cancel_withdraws_queued_waiter() {
        let parked = Arc::new(StdMutex::new(None));
        let slot = Arc::clone(&parked);
        let future = Future::<u32, String>::new(InlineExecutor, move |p| {
            *slot.lock().unwrap() = Some(p);
        });

        let mut released = Vec::new();
        for _ in 0..1_000 {
            let (sink, log) = RecordingSink::new(Demand::UNLIMITED);
            let handle = future.attach(sink);
            assert_eq!(future.waiting(), 1);
            handle.cancel();
            assert_eq!(future.waiting(), 0);

            let connection = Arc::downgrade(&handle);
            drop(handle);
            assert!(connection.upgrade().is_none(), "cancelled connection still owned");
            released.push(log);
        }
        assert!(released.iter().all(|log| log.is_released()));

        // The claim survives: a live subscriber still gets the result.
        let (sink, log) = RecordingSink::new(Demand::UNLIMITED);
        let _handle = future.attach(sink);
        assert_eq!(future.waiting(), 1);
        parked.lock().unwrap().take().expect("claimed once").succeed(4);
        assert_eq!(log.values(), vec![4]);
        assert_eq!(log.completions(), 1);
    }

    #[test]
    fn test_cancel_after_completion_is_noop() {
        let (sink, log) = RecordingSink::new(Demand::UNLIMITED);
        let handle = immediate(1).attach(sink);
        handle.cancel();
        assert_eq!(log.values(), vec![1]);
        assert_eq!(log.completions(), 1);
    }

    #[test]
    fn test_refused_job_releases_sink() {
        let executor = Arc::new(ManualExecutor {
            refuse: true,
            ..ManualExecutor::default()
        });
        let future = Future::<u32, String>::new(executor, |p| p.succeed(5));
        let (sink, log) = RecordingSink::new(Demand::UNLIMITED);
        let _handle = future.attach(sink);

        assert!(log.is_released());
        assert_eq!(log.events(), vec![Recorded::Subscribed]);
    }

    #[test]
    fn test_sinks_share_one_resolution() {
        let executor = Arc::new(ManualExecutor::default());
        let runs = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let r = Arc::clone(&runs);
        let future = Future::<u32, String>::new(Arc::clone(&executor), move |p| {
            r.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            p.succeed(11);
        });

        let (a, log_a) = RecordingSink::new(Demand::UNLIMITED);
        let (b, log_b) = RecordingSink::new(Demand::UNLIMITED);
        let _ha = future.attach(a);
        let _hb = future.attach(b);
        assert_eq!(executor.run_all(), 2);

        assert_eq!(runs.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(log_a.values(), vec![11]);
        assert_eq!(log_b.values(), vec![11]);
    }
}
