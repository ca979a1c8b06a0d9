//! Error types for pushflow operations.

use thiserror::Error;

/// Errors from validating a demand count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DemandError {
    /// A demand was constructed from a negative count.
    #[error("negative demand: {0}")]
    Negative(i64),
}

/// Errors from handing a job to an [`Executor`](crate::Executor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExecuteError {
    /// The executor has been shut down and no longer accepts jobs.
    #[error("executor has been shut down")]
    ShutDown,
}

/// Errors from awaiting a single value with [`Future::get`](crate::Future::get).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AwaitError<F> {
    /// The source completed with a failure.
    #[error("source failed: {0}")]
    Failed(F),

    /// The source finished without producing a value.
    #[error("source finished without a value")]
    Empty,

    /// The subscription was dropped before it completed, e.g. because its
    /// executor shut down or its fulfiller abandoned the promise.
    #[error("subscription abandoned before completion")]
    Abandoned,
}

impl<F> AwaitError<F> {
    /// Returns the source's failure, if that is what ended the wait.
    pub fn into_failure(self) -> Option<F> {
        match self {
            Self::Failed(e) => Some(e),
            Self::Empty | Self::Abandoned => None,
        }
    }

    /// Returns `true` if the wait ended without the source completing.
    #[inline]
    pub fn is_abandoned(&self) -> bool {
        matches!(self, Self::Abandoned)
    }
}
