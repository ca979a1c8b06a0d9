//! Type-erasing wrappers for sources and sinks.

use crate::completion::Completion;
use crate::demand::Demand;
use crate::protocol::{Sink, Source, SubscriptionHandle};
use std::fmt;
use std::sync::Arc;

/// A type-erased sink.
///
/// Cloning an `AnySink` shares the wrapped sink; it does not duplicate it.
pub struct AnySink<I, F> {
    inner: Arc<dyn Sink<Input = I, Failure = F>>,
}

impl<I: 'static, F: 'static> AnySink<I, F> {
    /// Wraps `sink`, hiding its concrete type.
    pub fn new<S>(sink: S) -> Self
    where
        S: Sink<Input = I, Failure = F>,
    {
        Self {
            inner: Arc::new(sink),
        }
    }
}

impl<I, F> Clone for AnySink<I, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<I, F> fmt::Debug for AnySink<I, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnySink").finish_non_exhaustive()
    }
}

impl<I: 'static, F: 'static> Sink for AnySink<I, F> {
    type Input = I;
    type Failure = F;

    fn on_subscribe(&self, subscription: SubscriptionHandle) {
        self.inner.on_subscribe(subscription);
    }

    fn on_value(&self, value: I) -> Demand {
        self.inner.on_value(value)
    }

    fn on_completion(&self, completion: Completion<F>) {
        self.inner.on_completion(completion);
    }
}

/// A type-erased source.
///
/// Use it to hand out a source without exposing its concrete type.
pub struct AnySource<O, F> {
    attach: Arc<dyn Fn(AnySink<O, F>) -> SubscriptionHandle + Send + Sync>,
}

impl<O: 'static, F: 'static> AnySource<O, F> {
    /// Wraps `source`, hiding its concrete type.
    pub fn new<P>(source: P) -> Self
    where
        P: Source<Output = O, Failure = F> + Send + Sync + 'static,
    {
        Self {
            attach: Arc::new(move |sink: AnySink<O, F>| source.attach(sink)),
        }
    }
}

impl<O, F> Clone for AnySource<O, F> {
    fn clone(&self) -> Self {
        Self {
            attach: Arc::clone(&self.attach),
        }
    }
}

impl<O, F> fmt::Debug for AnySource<O, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnySource").finish_non_exhaustive()
    }
}

impl<O: 'static, F: 'static> Source for AnySource<O, F> {
    type Output = O;
    type Failure = F;

    fn attach<S>(&self, sink: S) -> SubscriptionHandle
    where
        S: Sink<Input = O, Failure = F>,
    {
        (self.attach)(AnySink::new(sink))
    }
}
