//! Terminal signal of a subscription.

/// A signal that a source will produce no further values, either because it
/// finished normally or because it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Completion<E> {
    /// The source finished normally.
    Finished,
    /// The source stopped because of the carried error.
    Failed(E),
}

impl<E> Completion<E> {
    /// Returns `true` for [`Completion::Finished`].
    #[inline]
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }

    /// Returns `true` for [`Completion::Failed`].
    #[inline]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns the carried error, if any.
    pub fn error(&self) -> Option<&E> {
        match self {
            Self::Finished => None,
            Self::Failed(e) => Some(e),
        }
    }

    /// Converts into a `Result`, mapping `Finished` to `Ok(())`.
    pub fn into_result(self) -> Result<(), E> {
        match self {
            Self::Finished => Ok(()),
            Self::Failed(e) => Err(e),
        }
    }
}

impl<E> From<Result<(), E>> for Completion<E> {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::Finished,
            Err(e) => Self::Failed(e),
        }
    }
}
