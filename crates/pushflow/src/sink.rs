//! Closure-based sink and the `SourceExt` convenience methods.

use crate::cancel::CancelGuard;
use crate::completion::Completion;
use crate::demand::Demand;
use crate::erased::AnySource;
use crate::protocol::{Cancellable, Sink, Source, SubscriptionHandle};
use crate::sync::{lock, Mutex};
use std::fmt;

type ValueFn<I> = Box<dyn FnMut(I) + Send>;
type CompletionFn<F> = Box<dyn FnOnce(Completion<F>) + Send>;

/// A sink that requests unlimited demand on subscription and forwards every
/// event to user closures.
///
/// Wrap it in an `Arc` before attaching to keep a handle for
/// [`cancel`](Cancellable::cancel), or use [`SourceExt::sink`] to get a
/// [`CancelGuard`] instead.
pub struct ClosureSink<I, F> {
    on_value: Mutex<ValueFn<I>>,
    on_completion: Mutex<Option<CompletionFn<F>>>,
    subscription: Mutex<Option<SubscriptionHandle>>,
}

impl<I, F> ClosureSink<I, F> {
    /// Creates a sink from a value callback and a completion callback.
    pub fn new<V, C>(on_value: V, on_completion: C) -> Self
    where
        V: FnMut(I) + Send + 'static,
        C: FnOnce(Completion<F>) + Send + 'static,
    {
        Self {
            on_value: Mutex::new(Box::new(on_value)),
            on_completion: Mutex::new(Some(Box::new(on_completion))),
            subscription: Mutex::new(None),
        }
    }
}

impl<I: 'static, F: 'static> Sink for ClosureSink<I, F> {
    type Input = I;
    type Failure = F;

    fn on_subscribe(&self, subscription: SubscriptionHandle) {
        *lock(&self.subscription) = Some(std::sync::Arc::clone(&subscription));
        subscription.request(Demand::UNLIMITED);
    }

    fn on_value(&self, value: I) -> Demand {
        let mut on_value = lock(&self.on_value);
        (*on_value)(value);
        Demand::UNLIMITED
    }

    fn on_completion(&self, completion: Completion<F>) {
        let callback = lock(&self.on_completion).take();
        if let Some(callback) = callback {
            callback(completion);
        }
        // The subscription is over; drop our reference to it.
        lock(&self.subscription).take();
    }
}

impl<I, F> Cancellable for ClosureSink<I, F> {
    fn cancel(&self) {
        let subscription = lock(&self.subscription).take();
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
    }
}

impl<I, F> fmt::Debug for ClosureSink<I, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureSink")
            .field("subscribed", &lock(&self.subscription).is_some())
            .finish_non_exhaustive()
    }
}

/// Convenience methods available on every [`Source`].
pub trait SourceExt: Source {
    /// Attaches a [`ClosureSink`] and returns a guard that cancels the
    /// subscription when dropped.
    ///
    /// Keep the guard alive until the completion callback has run.
    fn sink<V, C>(&self, on_value: V, on_completion: C) -> CancelGuard
    where
        V: FnMut(Self::Output) + Send + 'static,
        C: FnOnce(Completion<Self::Failure>) + Send + 'static,
        Self::Output: 'static,
        Self::Failure: 'static,
    {
        CancelGuard::new(self.attach(ClosureSink::new(on_value, on_completion)))
    }

    /// Hides the concrete source type behind [`AnySource`].
    fn erase(self) -> AnySource<Self::Output, Self::Failure>
    where
        Self: Sized + Send + Sync + 'static,
        Self::Output: 'static,
        Self::Failure: 'static,
    {
        AnySource::new(self)
    }
}

impl<P: Source + ?Sized> SourceExt for P {}
