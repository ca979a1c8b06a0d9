//! pushflow-testing - Event-Sequence Assertions for pushflow Sources
//!
//! Two sinks for exercising a [`Source`](pushflow::Source) in tests:
//!
//! - [`AssertReceiveEvents`] checks delivered events against an expected
//!   sequence as they arrive, and signals once the sequence is complete.
//! - [`EventRecorder`] records deliveries so a test can inspect them
//!   afterwards.
//!
//! # Example
//!
//! ```
//! use pushflow::{Future, InlineExecutor};
//! use pushflow_testing::{Event, SourceAssertExt};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! let future = Future::<u32, String>::new(InlineExecutor, |p| p.succeed(42));
//! let done = Arc::new(AtomicBool::new(false));
//! let flag = Arc::clone(&done);
//!
//! let _guard = future.assert_receive(
//!     vec![Event::Value(42), Event::finished()],
//!     move || flag.store(true, Ordering::SeqCst),
//! );
//! assert!(done.load(Ordering::SeqCst));
//! ```

mod assert;
mod event;
mod recorder;

pub use assert::{AssertReceiveEvents, SourceAssertExt};
pub use event::Event;
pub use recorder::EventRecorder;
