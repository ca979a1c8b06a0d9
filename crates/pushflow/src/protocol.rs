//! The source/sink/subscription capability contract.
//!
//! Every implementation must uphold the following ordering, per subscription:
//!
//! 1. [`Sink::on_subscribe`] is delivered exactly once, before anything else.
//! 2. [`Sink::on_value`] is delivered only against demand the sink requested;
//!    a sink that only ever requests [`Demand::NONE`] receives no values.
//! 3. [`Sink::on_completion`] is delivered at most once, and nothing follows it.
//! 4. [`Cancellable::cancel`] is idempotent and may be called at any time. It
//!    stops further deliveries on a best-effort basis.

use crate::completion::Completion;
use crate::demand::Demand;
use std::sync::Arc;

/// An activity that supports cancellation.
pub trait Cancellable {
    /// Cancels the activity. Calling this more than once has no further effect.
    fn cancel(&self);
}

/// The connection of one sink to one source.
///
/// A sink uses its subscription to pull values (`request`) or to stop
/// receiving them (`cancel`).
pub trait Subscription: Cancellable + Send + Sync {
    /// Tells the source the sink wants up to `demand` more values.
    fn request(&self, demand: Demand);
}

/// A shared, type-erased subscription handle.
///
/// The same handle is passed to [`Sink::on_subscribe`] and returned from
/// [`Source::attach`].
pub type SubscriptionHandle = Arc<dyn Subscription>;

impl<S: Subscription + ?Sized> Cancellable for Arc<S> {
    fn cancel(&self) {
        (**self).cancel();
    }
}

/// The consumer side of the protocol.
///
/// Callbacks take `&self` because a source may invoke them from any thread,
/// and a sink may re-enter its subscription from inside `on_subscribe`.
pub trait Sink: Send + Sync + 'static {
    /// The kind of values this sink receives.
    type Input;
    /// The kind of errors this sink receives.
    type Failure;

    /// Receives the subscription. Called exactly once, before any value.
    fn on_subscribe(&self, subscription: SubscriptionHandle);

    /// Receives one value, returning how many more values the sink wants.
    ///
    /// The returned demand is advisory bookkeeping for the source.
    fn on_value(&self, value: Self::Input) -> Demand;

    /// Receives the terminal signal. Called at most once.
    fn on_completion(&self, completion: Completion<Self::Failure>);
}

/// The producer side of the protocol.
pub trait Source {
    /// The kind of values this source produces.
    type Output;
    /// The kind of errors this source may fail with.
    type Failure;

    /// Attaches `sink` to this source.
    ///
    /// Each call creates an independent subscription, hands it to the sink via
    /// [`Sink::on_subscribe`] and returns it to the caller. Attaching the same
    /// sink twice yields two unrelated subscriptions.
    fn attach<S>(&self, sink: S) -> SubscriptionHandle
    where
        S: Sink<Input = Self::Output, Failure = Self::Failure>;
}

impl<S: Sink> Sink for Arc<S> {
    type Input = S::Input;
    type Failure = S::Failure;

    fn on_subscribe(&self, subscription: SubscriptionHandle) {
        (**self).on_subscribe(subscription);
    }

    fn on_value(&self, value: Self::Input) -> Demand {
        (**self).on_value(value)
    }

    fn on_completion(&self, completion: Completion<Self::Failure>) {
        (**self).on_completion(completion);
    }
}
