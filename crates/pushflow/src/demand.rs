//! Demand: how many values a sink is currently willing to receive.

use crate::error::DemandError;
use std::cmp::Ordering;
use std::fmt;

/// A requested number of values, sent from a sink to a source through its
/// subscription.
///
/// A demand is either bounded (`max = Some(n)`) or unlimited (`max = None`).
/// Demands are totally ordered: bounded demands compare by magnitude and
/// [`Demand::UNLIMITED`] is greater than every bounded demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Demand {
    max: Option<usize>,
}

impl Demand {
    /// A request for as many values as the source can produce.
    pub const UNLIMITED: Demand = Demand { max: None };

    /// A request for no values. Equivalent to `Demand::max(0)`.
    pub const NONE: Demand = Demand { max: Some(0) };

    /// Creates a bounded demand for at most `n` values.
    #[inline]
    pub const fn max(n: usize) -> Self {
        Self { max: Some(n) }
    }

    /// Creates a bounded demand from a signed count.
    ///
    /// # Panics
    ///
    /// Panics if `n` is negative. A negative demand is a caller bug, not a
    /// runtime condition; use [`Demand::try_from`] to validate untrusted input.
    #[inline]
    pub fn bounded(n: i64) -> Self {
        match Self::try_from(n) {
            Ok(demand) => demand,
            Err(e) => panic!("{e}"),
        }
    }

    /// Returns the bound, or `None` if the demand is unlimited.
    #[inline]
    pub const fn limit(&self) -> Option<usize> {
        self.max
    }

    /// Returns `true` for [`Demand::UNLIMITED`].
    #[inline]
    pub const fn is_unlimited(&self) -> bool {
        self.max.is_none()
    }

    /// Returns `true` for a bounded demand of zero.
    #[inline]
    pub const fn is_none(&self) -> bool {
        matches!(self.max, Some(0))
    }
}

impl TryFrom<i64> for Demand {
    type Error = DemandError;

    fn try_from(n: i64) -> Result<Self, Self::Error> {
        usize::try_from(n)
            .map(Self::max)
            .map_err(|_| DemandError::Negative(n))
    }
}

impl From<usize> for Demand {
    fn from(n: usize) -> Self {
        Self::max(n)
    }
}

impl Ord for Demand {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.max, other.max) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

impl PartialOrd for Demand {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Demand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(n) => write!(f, "max({n})"),
            None => f.write_str("unlimited"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_bounded_zero() {
        assert_eq!(Demand::NONE, Demand::max(0));
        assert_eq!(Demand::NONE, Demand::bounded(0));
        assert!(Demand::NONE.is_none());
        assert!(!Demand::max(1).is_none());
        assert!(!Demand::UNLIMITED.is_none());
    }

    #[test]
    fn test_unlimited_is_maximum() {
        assert!(Demand::UNLIMITED > Demand::max(usize::MAX));
        assert!(Demand::UNLIMITED > Demand::NONE);
        assert_eq!(Demand::UNLIMITED, Demand::UNLIMITED);
        assert_eq!(Demand::UNLIMITED.cmp(&Demand::UNLIMITED), Ordering::Equal);
        assert_eq!(Demand::UNLIMITED.limit(), None);
    }

    #[test]
    fn test_bounded_compares_by_magnitude() {
        assert!(Demand::bounded(1) < Demand::bounded(2));
        assert!(Demand::bounded(7) > Demand::bounded(3));
        assert_eq!(Demand::bounded(5).limit(), Some(5));
    }

    #[test]
    #[should_panic(expected = "negative demand")]
    fn test_bounded_negative_panics() {
        let _ = Demand::bounded(-5);
    }

    #[test]
    fn test_try_from_negative_is_error() {
        assert_eq!(Demand::try_from(-1i64), Err(DemandError::Negative(-1)));
        assert_eq!(Demand::try_from(3i64), Ok(Demand::max(3)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Demand::max(4).to_string(), "max(4)");
        assert_eq!(Demand::UNLIMITED.to_string(), "unlimited");
    }
}
