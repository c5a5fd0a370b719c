//! Miscellaneous utility structs and functions.

use std::fmt::Debug;

use cgmath::num_traits::Float;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An interval on the real number line.
#[derive(Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Interval<T> {
    pub min: T,
    pub max: T,
}

impl<T> Interval<T> {
    /// Creates a new interval.
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }
}

impl<T: std::cmp::PartialOrd> Interval<T> {
    /// Returns true if this interval overlaps with the other.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.max > other.min && other.max > self.min
    }

    /// Returns true if this interval contains the value.
    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }
}

impl<T: Float> Interval<T> {
    /// Creates an interval with the given centre and radius.
    pub fn disc(centre: T, radius: T) -> Self {
        Self {
            min: centre - radius,
            max: centre + radius,
        }
    }

    /// Creates an interval which scales `nominal` by the factors `lo` and `hi`.
    pub fn scaled(nominal: T, lo: T, hi: T) -> Self {
        Self {
            min: lo * nominal,
            max: hi * nominal,
        }
    }

    /// Clamps a value into the interval.
    pub fn clamp(&self, value: T) -> T {
        value.max(self.min).min(self.max)
    }

    /// Computes the smallest interval containing all of the given values.
    pub fn hull(values: impl IntoIterator<Item = T>) -> Self {
        values.into_iter().fold(
            Self {
                min: T::infinity(),
                max: T::neg_infinity(),
            },
            |acc, v| Self {
                min: acc.min.min(v),
                max: acc.max.max(v),
            },
        )
    }
}

impl<T: Debug> Debug for Interval<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interval({:?}, {:?})", &self.min, &self.max)
    }
}

#[cfg(test)]
mod test {
    use super::Interval;

    #[test]
    fn clamp_and_contains() {
        let band = Interval::new(10.0, 30.0);
        assert_eq!(band.clamp(5.0), 10.0);
        assert_eq!(band.clamp(40.0), 30.0);
        assert_eq!(band.clamp(12.5), 12.5);
        assert!(band.contains(30.0));
        assert!(!band.contains(30.5));
        assert_eq!(Interval::disc(2.0, 0.5), Interval::new(1.5, 2.5));
    }

    #[test]
    fn hull_overlaps() {
        let a = Interval::hull([3.0, -1.0, 2.0]);
        assert_eq!(a, Interval::new(-1.0, 3.0));
        assert!(a.overlaps(&Interval::new(2.5, 8.0)));
        assert!(!a.overlaps(&Interval::new(3.5, 8.0)));
    }
}
