//! Loom-based concurrency tests for the exactly-once claim.
//!
//! Run with: `cargo test -p pushflow --features loom --test loom_tests --release`
//!
//! The memo and per-subscription state swap their `Mutex`/`Arc`/`AtomicBool`
//! for loom's under this feature, so every interleaving of racing resolvers
//! is explored.

#![cfg(feature = "loom")]

use loom::sync::atomic::{AtomicUsize, Ordering};
use loom::sync::{Arc, Mutex};
use loom::thread;
use pushflow::{Cancellable, Completion, Demand, Future, InlineExecutor, Sink, Source};
use pushflow::SubscriptionHandle;

type Results = Arc<Mutex<Vec<Result<u32, String>>>>;

fn record(results: &Results) -> impl FnOnce(Result<u32, String>) + Send + 'static {
    let results = Arc::clone(results);
    move |r| results.lock().unwrap().push(r)
}

/// Two threads resolve concurrently; the fulfiller runs exactly once and both
/// see the same result.
#[test]
fn loom_concurrent_resolve_claims_once() {
    loom::model(|| {
        let runs = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&runs);
        let future = Future::<u32, String>::new(InlineExecutor, move |p| {
            r.fetch_add(1, Ordering::SeqCst);
            p.succeed(7);
        });
        let results: Results = Arc::new(Mutex::new(Vec::new()));

        let f1 = future.clone();
        let cb1 = record(&results);
        let t1 = thread::spawn(move || f1.resolve(cb1));

        let f2 = future.clone();
        let cb2 = record(&results);
        let t2 = thread::spawn(move || f2.resolve(cb2));

        t1.join().unwrap();
        t2.join().unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        let results = results.lock().unwrap();
        assert_eq!(*results, vec![Ok(7), Ok(7)]);
    });
}

/// The promise is fulfilled on one thread while another resolves: the late
/// resolver either queues behind the in-flight claim or reads the memo.
#[test]
fn loom_fulfill_races_resolve() {
    loom::model(|| {
        let parked = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&parked);
        let future = Future::<u32, String>::new(InlineExecutor, move |p| {
            *slot.lock().unwrap() = Some(p);
        });
        let results: Results = Arc::new(Mutex::new(Vec::new()));

        future.resolve(record(&results));
        let promise = parked.lock().unwrap().take().expect("claimed");

        let fulfiller = thread::spawn(move || promise.succeed(3));

        let f = future.clone();
        let cb = record(&results);
        let resolver = thread::spawn(move || f.resolve(cb));

        fulfiller.join().unwrap();
        resolver.join().unwrap();

        assert_eq!(*results.lock().unwrap(), vec![Ok(3), Ok(3)]);
        assert_eq!(future.peek(), Some(Ok(3)));
    });
}

struct CountingSink {
    values: Arc<AtomicUsize>,
    completions: Arc<AtomicUsize>,
}

impl Sink for CountingSink {
    type Input = u32;
    type Failure = String;

    fn on_subscribe(&self, _subscription: SubscriptionHandle) {}

    fn on_value(&self, _value: u32) -> Demand {
        self.values.fetch_add(1, Ordering::SeqCst);
        Demand::NONE
    }

    fn on_completion(&self, _completion: Completion<String>) {
        self.completions.fetch_add(1, Ordering::SeqCst);
    }
}

/// Racing requests on one subscription dispatch a single delivery, and a
/// racing cancel either suppresses it entirely or lets it run to the end.
#[test]
fn loom_request_races_cancel() {
    loom::model(|| {
        let values = Arc::new(AtomicUsize::new(0));
        let completions = Arc::new(AtomicUsize::new(0));
        let future = Future::<u32, String>::succeeded(InlineExecutor, 1);
        let handle = future.attach(CountingSink {
            values: Arc::clone(&values),
            completions: Arc::clone(&completions),
        });

        let h1 = handle.clone();
        let a = thread::spawn(move || h1.request(Demand::UNLIMITED));
        let h2 = handle.clone();
        let b = thread::spawn(move || h2.request(Demand::max(1)));
        let h3 = handle.clone();
        let c = thread::spawn(move || h3.cancel());

        a.join().unwrap();
        b.join().unwrap();
        c.join().unwrap();

        let (v, done) = (
            values.load(Ordering::SeqCst),
            completions.load(Ordering::SeqCst),
        );
        assert!(v <= 1 && v == done, "values={v} completions={done}");
    });
}
