//! A sink that checks a subscription against an expected event sequence.

use crate::event::Event;
use pushflow::{
    Cancellable, CancelGuard, Completion, Demand, Sink, Source, SubscriptionHandle,
};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Callback = Box<dyn FnOnce() + Send>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Progress<O, F> {
    expected: Vec<Event<O, F>>,
    received: usize,
}

/// Compares every delivered event, in order, with an expected sequence.
///
/// Panics on the first event that differs from its expected counterpart, and
/// on any event past the end of the sequence. `on_all_received` runs once,
/// right after the last expected event arrives; with an empty expectation it
/// never runs.
///
/// Panics surface on whichever thread delivers the event. Pair the sink with
/// an [`InlineExecutor`](pushflow::InlineExecutor) to have them fail the test
/// directly.
pub struct AssertReceiveEvents<O, F> {
    progress: Mutex<Progress<O, F>>,
    on_all_received: Mutex<Option<Callback>>,
    subscription: Mutex<Option<SubscriptionHandle>>,
    demand: Demand,
}

impl<O, F> AssertReceiveEvents<O, F> {
    /// Creates a sink that requests unlimited demand on subscription.
    pub fn new<C>(expected: Vec<Event<O, F>>, on_all_received: C) -> Self
    where
        C: FnOnce() + Send + 'static,
    {
        Self {
            progress: Mutex::new(Progress {
                expected,
                received: 0,
            }),
            on_all_received: Mutex::new(Some(Box::new(on_all_received))),
            subscription: Mutex::new(None),
            demand: Demand::UNLIMITED,
        }
    }

    /// Requests `demand` on subscription instead of unlimited.
    pub fn with_demand(mut self, demand: Demand) -> Self {
        self.demand = demand;
        self
    }

    /// Number of events received so far.
    pub fn received(&self) -> usize {
        lock(&self.progress).received
    }
}

impl<O, F> AssertReceiveEvents<O, F>
where
    O: PartialEq + fmt::Debug,
    F: PartialEq + fmt::Debug,
{
    fn receive(&self, event: Event<O, F>) {
        let (verdict, done) = {
            let mut progress = lock(&self.progress);
            let index = progress.received;
            progress.received += 1;
            let verdict = match progress.expected.get(index) {
                Some(expected) if *expected == event => Ok(()),
                Some(expected) => Err(format!(
                    "event #{index} mismatch: expected {expected:?}, received {event:?}"
                )),
                None => Err(format!(
                    "received more than the {} expected events: {event:?}",
                    progress.expected.len()
                )),
            };
            (verdict, progress.received == progress.expected.len())
        };

        if let Err(message) = verdict {
            panic!("{message}");
        }
        if done {
            let callback = lock(&self.on_all_received).take();
            if let Some(callback) = callback {
                callback();
            }
        }
    }
}

impl<O, F> Sink for AssertReceiveEvents<O, F>
where
    O: PartialEq + fmt::Debug + Send + 'static,
    F: PartialEq + fmt::Debug + Send + 'static,
{
    type Input = O;
    type Failure = F;

    fn on_subscribe(&self, subscription: SubscriptionHandle) {
        *lock(&self.subscription) = Some(Arc::clone(&subscription));
        subscription.request(self.demand);
    }

    fn on_value(&self, value: O) -> Demand {
        self.receive(Event::Value(value));
        Demand::NONE
    }

    fn on_completion(&self, completion: Completion<F>) {
        lock(&self.subscription).take();
        self.receive(Event::Completion(completion));
    }
}

impl<O, F> Cancellable for AssertReceiveEvents<O, F> {
    fn cancel(&self) {
        let subscription = lock(&self.subscription).take();
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
    }
}

impl<O, F> fmt::Debug for AssertReceiveEvents<O, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let progress = lock(&self.progress);
        f.debug_struct("AssertReceiveEvents")
            .field("expected", &progress.expected.len())
            .field("received", &progress.received)
            .field("demand", &self.demand)
            .finish_non_exhaustive()
    }
}

/// Attaches an [`AssertReceiveEvents`] sink to any [`Source`].
pub trait SourceAssertExt: Source {
    /// Asserts that this source delivers exactly `expected`, calling
    /// `on_all_received` after the last event.
    ///
    /// The returned guard cancels the subscription when dropped.
    fn assert_receive<C>(
        &self,
        expected: Vec<Event<Self::Output, Self::Failure>>,
        on_all_received: C,
    ) -> CancelGuard
    where
        C: FnOnce() + Send + 'static,
        Self::Output: PartialEq + fmt::Debug + Send + 'static,
        Self::Failure: PartialEq + fmt::Debug + Send + 'static,
    {
        CancelGuard::new(self.attach(AssertReceiveEvents::new(expected, on_all_received)))
    }
}

impl<P: Source + ?Sized> SourceAssertExt for P {}
