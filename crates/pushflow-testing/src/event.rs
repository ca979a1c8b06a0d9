//! The observable events of one subscription.

use pushflow::Completion;

/// One delivery a sink can observe after subscribing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<O, F> {
    /// A value delivered through `on_value`.
    Value(O),
    /// The terminal signal delivered through `on_completion`.
    Completion(Completion<F>),
}

impl<O, F> Event<O, F> {
    /// Shorthand for `Event::Completion(Completion::Finished)`.
    pub const fn finished() -> Self {
        Self::Completion(Completion::Finished)
    }

    /// Shorthand for `Event::Completion(Completion::Failed(error))`.
    pub const fn failed(error: F) -> Self {
        Self::Completion(Completion::Failed(error))
    }

    /// Returns `true` for a completion event.
    pub fn is_completion(&self) -> bool {
        matches!(self, Self::Completion(_))
    }
}
