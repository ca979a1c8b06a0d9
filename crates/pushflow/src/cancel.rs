//! Scope-bound cancellation.

use crate::protocol::Cancellable;
use std::fmt;

/// A type-erased cancellation token that cancels when dropped.
///
/// Returned by [`SourceExt::sink`](crate::SourceExt::sink) so that a
/// subscription lives exactly as long as the guard. Call [`detach`] to let the
/// subscription outlive the guard; the subscription and any in-flight work are
/// then only stopped by an explicit `cancel()` elsewhere.
///
/// [`detach`]: CancelGuard::detach
#[must_use = "dropping a CancelGuard cancels the subscription immediately"]
pub struct CancelGuard {
    target: Option<Box<dyn Cancellable + Send + Sync>>,
}

impl CancelGuard {
    /// Creates a guard that cancels `target` on drop.
    pub fn new<C>(target: C) -> Self
    where
        C: Cancellable + Send + Sync + 'static,
    {
        Self {
            target: Some(Box::new(target)),
        }
    }

    /// Releases the guard without cancelling.
    pub fn detach(mut self) {
        self.target = None;
    }
}

impl Cancellable for CancelGuard {
    fn cancel(&self) {
        if let Some(target) = &self.target {
            target.cancel();
        }
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if let Some(target) = self.target.take() {
            target.cancel();
        }
    }
}

impl fmt::Debug for CancelGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelGuard")
            .field("armed", &self.target.is_some())
            .finish()
    }
}
