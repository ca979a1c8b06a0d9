//! Recording sink shared by the unit tests.

use crate::completion::Completion;
use crate::demand::Demand;
use crate::protocol::{Sink, SubscriptionHandle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Recorded<O, F> {
    Subscribed,
    Value(O),
    Completion(Completion<F>),
}

pub(crate) struct Log<O, F> {
    events: Mutex<Vec<Recorded<O, F>>>,
    released: AtomicBool,
}

impl<O: Clone, F: Clone> Log<O, F> {
    pub(crate) fn events(&self) -> Vec<Recorded<O, F>> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn values(&self) -> Vec<O> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Value(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn completions(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Recorded::Completion(_)))
            .count()
    }

    pub(crate) fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

/// Records every callback and requests `initial` demand on subscribe.
pub(crate) struct RecordingSink<O, F> {
    log: Arc<Log<O, F>>,
    initial: Demand,
}

impl<O, F> RecordingSink<O, F> {
    pub(crate) fn new(initial: Demand) -> (Self, Arc<Log<O, F>>) {
        let log = Arc::new(Log {
            events: Mutex::new(Vec::new()),
            released: AtomicBool::new(false),
        });
        (
            Self {
                log: Arc::clone(&log),
                initial,
            },
            log,
        )
    }
}

impl<O: Send + 'static, F: Send + 'static> Sink for RecordingSink<O, F> {
    type Input = O;
    type Failure = F;

    fn on_subscribe(&self, subscription: SubscriptionHandle) {
        self.log.events.lock().unwrap().push(Recorded::Subscribed);
        subscription.request(self.initial);
    }

    fn on_value(&self, value: O) -> Demand {
        self.log.events.lock().unwrap().push(Recorded::Value(value));
        Demand::NONE
    }

    fn on_completion(&self, completion: Completion<F>) {
        self.log
            .events
            .lock()
            .unwrap()
            .push(Recorded::Completion(completion));
    }
}

impl<O, F> Drop for RecordingSink<O, F> {
    fn drop(&mut self) {
        self.log.released.store(true, Ordering::SeqCst);
    }
}
