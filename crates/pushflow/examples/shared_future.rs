//! One expensive lookup, many subscribers.
//!
//! A `Future` is attached from several places at once: through the worker
//! pool with closure sinks, and from async code on Tokio's blocking pool. The
//! lookup runs once; every subscriber receives the same answer.
//!
//! Run with: `RUST_LOG=pushflow=debug cargo run -p pushflow --example shared_future`

use pushflow::{AwaitError, Completion, Future, PoolConfig, SourceExt, TokioExecutor, WorkerPool};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

static LOOKUPS: AtomicUsize = AtomicUsize::new(0);

fn lookup(key: &str) -> Result<u64, String> {
    LOOKUPS.fetch_add(1, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(50));
    match key {
        "answer" => Ok(42),
        other => Err(format!("no entry for {other:?}")),
    }
}

fn pooled(pool: &Arc<WorkerPool>, key: &'static str) -> Future<u64, String> {
    Future::new(Arc::clone(pool), move |promise| promise.fulfill(lookup(key)))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let pool = Arc::new(WorkerPool::new(
        PoolConfig::default().with_workers(4).with_thread_name("lookup"),
    )?);

    // Closure sinks on the worker pool.
    let answer = pooled(&pool, "answer");
    let (tx, rx) = mpsc::channel();
    let guards: Vec<_> = (0..4)
        .map(|i| {
            let tx = tx.clone();
            answer.sink(
                move |v| {
                    let _ = tx.send((i, v));
                },
                move |completion| {
                    if let Completion::Failed(e) = completion {
                        tracing::error!(subscriber = i, error = %e, "lookup failed");
                    }
                },
            )
        })
        .collect();
    drop(tx);
    for (i, v) in rx.iter() {
        tracing::info!(subscriber = i, value = v, "received");
    }
    drop(guards);

    // Async subscribers on Tokio's blocking pool.
    let executor = TokioExecutor::try_current().ok_or("no tokio runtime")?;
    let missing = Future::<u64, String>::new(executor, |promise| {
        promise.fulfill(lookup("question"));
    });
    let (a, b) = tokio::join!(missing.get(), missing.get());
    for outcome in [a, b] {
        match outcome {
            Ok(v) => tracing::info!(value = v, "received"),
            Err(AwaitError::Failed(e)) => tracing::warn!(error = %e, "lookup failed"),
            Err(e) => return Err(e.to_string().into()),
        }
    }

    // Late subscribers read the memo.
    tracing::info!(value = ?answer.peek(), "memoized");
    tracing::info!(lookups = LOOKUPS.load(Ordering::SeqCst), "done");
    pool.shutdown();
    Ok(())
}
