//! Synchronization primitives for the memo and connection state, swappable
//! for loom.

#[cfg(feature = "loom")]
pub(crate) use loom::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

#[cfg(not(feature = "loom"))]
pub(crate) use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

use std::sync::PoisonError;

/// Locks `mutex`, recovering the guard if a previous holder panicked.
///
/// Fulfillers, sinks and callbacks never run under a lock. The only user code
/// that does is `Clone` of a memoized result, which never mutates the memo
/// mid-update, so a poisoned lock still guards consistent state.
#[inline]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
