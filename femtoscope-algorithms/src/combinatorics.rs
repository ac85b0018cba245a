//! Candidate-pair index generation.
//!
//! Produces the index pairs to be evaluated for one or two particle
//! collections. Non-identical species use every cross pair; identical
//! species use the strict upper triangle of one collection so that no pair
//! is counted twice and nothing is paired with itself.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Combination policy for pair generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PairPolicy {
    /// Every (i, j) with i from the first set and j from the second.
    FullCross,
    /// Every (i, j) with i < j from a single set.
    StrictUpper,
}

/// Restartable iterator over candidate index pairs.
///
/// Pairs are produced in row-major insertion order: all partners of index 0
/// first, then of index 1, and so on.
#[derive(Debug, Clone)]
pub struct PairIndices {
    policy: PairPolicy,
    len_a: usize,
    len_b: usize,
    i: usize,
    j: usize,
}

impl PairIndices {
    /// All cross pairs between two collections of the given lengths.
    #[must_use]
    pub fn full_cross(len_a: usize, len_b: usize) -> Self {
        Self {
            policy: PairPolicy::FullCross,
            len_a,
            len_b,
            i: 0,
            j: 0,
        }
    }

    /// Strict upper-triangle pairs within a single collection.
    #[must_use]
    pub fn strict_upper(len: usize) -> Self {
        Self {
            policy: PairPolicy::StrictUpper,
            len_a: len,
            len_b: len,
            i: 0,
            j: 1,
        }
    }

    /// Number of pairs the iterator will produce in total.
    #[must_use]
    pub fn total(&self) -> usize {
        match self.policy {
            PairPolicy::FullCross => self.len_a * self.len_b,
            PairPolicy::StrictUpper => self.len_a.saturating_sub(1) * self.len_a / 2,
        }
    }
}

impl Iterator for PairIndices {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.i >= self.len_a || self.j >= self.len_b {
            return None;
        }
        let pair = (self.i, self.j);
        self.j += 1;
        if self.j == self.len_b {
            self.i += 1;
            self.j = match self.policy {
                PairPolicy::FullCross => 0,
                PairPolicy::StrictUpper => self.i + 1,
            };
        }
        Some(pair)
    }
}

/// Builds the index pairs for the given policy.
///
/// Under `StrictUpper` the second length is ignored: self-pairs are drawn
/// from the first collection alone.
#[must_use]
pub fn pair_indices(policy: PairPolicy, len_a: usize, len_b: usize) -> PairIndices {
    match policy {
        PairPolicy::FullCross => PairIndices::full_cross(len_a, len_b),
        PairPolicy::StrictUpper => PairIndices::strict_upper(len_a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_full_cross_count() {
        let pairs: Vec<_> = PairIndices::full_cross(3, 4).collect();
        assert_eq!(pairs.len(), 12);
        assert_eq!(pairs[0], (0, 0));
        assert_eq!(pairs[11], (2, 3));
        // Every pair appears exactly once
        let unique: HashSet<_> = pairs.iter().copied().collect();
        assert_eq!(unique.len(), 12);
    }

    #[test]
    fn test_strict_upper_count() {
        // N = 5 -> N(N-1)/2 = 10 distinct unordered pairs
        let pairs: Vec<_> = PairIndices::strict_upper(5).collect();
        assert_eq!(pairs.len(), 10);
        let unique: HashSet<_> = pairs.iter().copied().collect();
        assert_eq!(unique.len(), 10);
        for (i, j) in pairs {
            assert!(i < j);
        }
    }

    #[test]
    fn test_empty_and_singleton() {
        assert_eq!(PairIndices::full_cross(0, 5).count(), 0);
        assert_eq!(PairIndices::full_cross(5, 0).count(), 0);
        assert_eq!(PairIndices::strict_upper(0).count(), 0);
        assert_eq!(PairIndices::strict_upper(1).count(), 0);
    }

    #[test]
    fn test_restartable() {
        let first: Vec<_> = pair_indices(PairPolicy::StrictUpper, 4, 4).collect();
        let second: Vec<_> = pair_indices(PairPolicy::StrictUpper, 4, 4).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_total_matches_count() {
        for (a, b) in [(0, 0), (1, 1), (3, 7), (10, 2)] {
            let it = PairIndices::full_cross(a, b);
            assert_eq!(it.total(), it.clone().count());
        }
        for n in [0, 1, 2, 5, 11] {
            let it = PairIndices::strict_upper(n);
            assert_eq!(it.total(), it.clone().count());
        }
    }

    #[test]
    fn test_insertion_order() {
        let pairs: Vec<_> = PairIndices::strict_upper(4).collect();
        assert_eq!(
            pairs,
            vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]
        );
    }
}
