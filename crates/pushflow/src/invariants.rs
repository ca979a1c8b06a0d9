//! Debug assertion macros for the resolution and delivery invariants.
//!
//! They are only active in debug builds (`#[cfg(debug_assertions)]`), so there
//! is zero overhead in release builds.

// =============================================================================
// Memo: claimed before populated
// =============================================================================

/// Assert that a promise only ever completes an in-flight claim.
///
/// **Invariant**: `Unclaimed → InFlight → Ready`, each edge taken once.
///
/// Used in: `Promise::fulfill()` when swapping the result into the memo
macro_rules! debug_assert_claimed {
    ($was_in_flight:expr) => {
        debug_assert!(
            $was_in_flight,
            "memo populated without an in-flight claim: fulfiller result arrived twice or unclaimed"
        )
    };
}

// =============================================================================
// Connection: monotonic resolve state
// =============================================================================

/// Assert that the connection's resolve state never moves backwards.
///
/// **Invariant**: `Pending < Resolving < Resolved`, transitions only increase.
///
/// Used in: `Connection::mark_resolved()`
macro_rules! debug_assert_state_advances {
    ($old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "resolve state regressed from {:?} to {:?}",
            $old,
            $new
        )
    };
}

// =============================================================================
// Connection: delivery only against demand
// =============================================================================

/// Assert that a delivery happens only after demand started resolution.
///
/// **Invariant**: `deliver → state was Resolving`
///
/// Used in: `Connection::finish()` before calling into the sink
macro_rules! debug_assert_demand_granted {
    ($state:expr) => {
        debug_assert!(
            $state == crate::connection::ResolveState::Resolving,
            "delivery attempted in state {:?} without granted demand",
            $state
        )
    };
}

pub(crate) use debug_assert_claimed;
pub(crate) use debug_assert_demand_granted;
pub(crate) use debug_assert_state_advances;
