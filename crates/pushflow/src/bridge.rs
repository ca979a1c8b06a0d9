//! Async bridge: await a [`Future`]'s single result from async code.

use crate::cancel::CancelGuard;
use crate::completion::Completion;
use crate::demand::Demand;
use crate::error::AwaitError;
use crate::future::Future;
use crate::protocol::{Sink, Source, SubscriptionHandle};
use crate::sync::{lock, Mutex};
use tokio::sync::oneshot;

/// Requests a single value and forwards the outcome through a oneshot.
///
/// If the sink is dropped without completing, the sender drops with it and
/// the receiver observes [`AwaitError::Abandoned`].
struct OneshotSink<O, F> {
    value: Mutex<Option<O>>,
    tx: Mutex<Option<oneshot::Sender<Result<O, AwaitError<F>>>>>,
}

impl<O: Send + 'static, F: Send + 'static> Sink for OneshotSink<O, F> {
    type Input = O;
    type Failure = F;

    fn on_subscribe(&self, subscription: SubscriptionHandle) {
        subscription.request(Demand::max(1));
    }

    fn on_value(&self, value: O) -> Demand {
        *lock(&self.value) = Some(value);
        Demand::NONE
    }

    fn on_completion(&self, completion: Completion<F>) {
        let outcome = match completion {
            Completion::Finished => lock(&self.value).take().ok_or(AwaitError::Empty),
            Completion::Failed(e) => Err(AwaitError::Failed(e)),
        };
        if let Some(tx) = lock(&self.tx).take() {
            // The awaiting side may have gone away; nothing to report then.
            let _ = tx.send(outcome);
        }
    }
}

impl<O, F> Future<O, F>
where
    O: Clone + Send + 'static,
    F: Clone + Send + 'static,
{
    /// Subscribes and waits for the result.
    ///
    /// Dropping the returned future cancels its subscription. The shared memo
    /// is unaffected, so other subscribers still see the result.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let executor = TokioExecutor::try_current().unwrap();
    /// let future = Future::<u32, String>::new(executor, |p| p.succeed(42));
    /// assert_eq!(future.get().await, Ok(42));
    /// ```
    pub async fn get(&self) -> Result<O, AwaitError<F>> {
        let (tx, rx) = oneshot::channel();
        let sink = OneshotSink {
            value: Mutex::new(None),
            tx: Mutex::new(Some(tx)),
        };
        let _guard = CancelGuard::new(self.attach(sink));
        rx.await.unwrap_or(Err(AwaitError::Abandoned))
    }
}
