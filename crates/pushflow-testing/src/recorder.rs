//! A sink that records what it receives for later inspection.

use crate::event::Event;
use pushflow::{Cancellable, Completion, Demand, Sink, SubscriptionHandle};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Records every event a subscription delivers.
///
/// Attach it behind an `Arc` to keep access after attaching:
///
/// ```
/// use pushflow::{Demand, Future, InlineExecutor, Source};
/// use pushflow_testing::{Event, EventRecorder};
/// use std::sync::Arc;
///
/// let future = Future::<u32, String>::succeeded(InlineExecutor, 42);
/// let recorder = Arc::new(EventRecorder::new(Demand::NONE));
/// let _handle = future.attach(Arc::clone(&recorder));
/// assert!(recorder.events().is_empty());
///
/// recorder.request(Demand::max(1));
/// assert_eq!(recorder.events(), vec![Event::Value(42), Event::finished()]);
/// ```
pub struct EventRecorder<O, F> {
    events: Mutex<Vec<Event<O, F>>>,
    subscriptions: AtomicUsize,
    subscription: Mutex<Option<SubscriptionHandle>>,
    initial: Demand,
}

impl<O, F> EventRecorder<O, F> {
    /// Creates a recorder that requests `initial` on subscription.
    pub fn new(initial: Demand) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            subscriptions: AtomicUsize::new(0),
            subscription: Mutex::new(None),
            initial,
        }
    }

    /// How many times `on_subscribe` has been called.
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::Acquire)
    }

    /// Number of events recorded so far.
    pub fn len(&self) -> usize {
        lock(&self.events).len()
    }

    /// Returns `true` if nothing has been delivered.
    pub fn is_empty(&self) -> bool {
        lock(&self.events).is_empty()
    }

    /// Returns `true` once a completion has been recorded.
    pub fn is_completed(&self) -> bool {
        lock(&self.events).iter().any(Event::is_completion)
    }

    /// Requests more values through the stored subscription.
    ///
    /// Does nothing before subscription or after completion.
    pub fn request(&self, demand: Demand) {
        let subscription = lock(&self.subscription).clone();
        if let Some(subscription) = subscription {
            subscription.request(demand);
        }
    }
}

impl<O: Clone, F: Clone> EventRecorder<O, F> {
    /// A snapshot of the recorded events, in delivery order.
    pub fn events(&self) -> Vec<Event<O, F>> {
        lock(&self.events).clone()
    }
}

impl<O, F> Sink for EventRecorder<O, F>
where
    O: Send + 'static,
    F: Send + 'static,
{
    type Input = O;
    type Failure = F;

    fn on_subscribe(&self, subscription: SubscriptionHandle) {
        self.subscriptions.fetch_add(1, Ordering::AcqRel);
        *lock(&self.subscription) = Some(Arc::clone(&subscription));
        subscription.request(self.initial);
    }

    fn on_value(&self, value: O) -> Demand {
        lock(&self.events).push(Event::Value(value));
        Demand::NONE
    }

    fn on_completion(&self, completion: Completion<F>) {
        lock(&self.subscription).take();
        lock(&self.events).push(Event::Completion(completion));
    }
}

impl<O, F> Cancellable for EventRecorder<O, F> {
    fn cancel(&self) {
        let subscription = lock(&self.subscription).take();
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
    }
}

impl<O: fmt::Debug, F: fmt::Debug> fmt::Debug for EventRecorder<O, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRecorder")
            .field("events", &*lock(&self.events))
            .field("subscriptions", &self.subscriptions())
            .finish_non_exhaustive()
    }
}
