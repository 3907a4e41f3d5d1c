//! Strong/weak leg classification
//!
//! A participant has three branches one level down. For each tier the ledger
//! reports how many activations each branch holds at the tier's depth. The
//! branch with the most activations is the strong leg; the other two are the
//! weak legs.
//!
//! Ties resolve to the lowest branch index. The weak legs keep their original
//! relative order.

use serde::{Deserialize, Serialize};

use crate::constants::MATRIX_WIDTH;

/// Result of classifying one 3-tuple of branch counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegSplit {
    pub strong_leg: u64,
    pub weak_leg1: u64,
    pub weak_leg2: u64,
    /// Branch index the strong leg came from
    pub strong_index: usize,
}

/// Classify branch counts into one strong and two weak legs
pub fn classify_legs(counts: [u64; MATRIX_WIDTH]) -> LegSplit {
    let mut strong_index = 0;
    for (i, &count) in counts.iter().enumerate().skip(1) {
        // strict comparison keeps the first index on ties
        if count > counts[strong_index] {
            strong_index = i;
        }
    }

    let mut weak = counts
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != strong_index)
        .map(|(_, &c)| c);

    LegSplit {
        strong_leg: counts[strong_index],
        weak_leg1: weak.next().unwrap_or(0),
        weak_leg2: weak.next().unwrap_or(0),
        strong_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_leg_in_middle() {
        let split = classify_legs([5, 12, 7]);
        assert_eq!(split.strong_leg, 12);
        assert_eq!(split.strong_index, 1);
        assert_eq!((split.weak_leg1, split.weak_leg2), (5, 7));
    }

    #[test]
    fn test_ties_resolve_to_first_index() {
        let split = classify_legs([4, 9, 9]);
        assert_eq!(split.strong_index, 1);
        assert_eq!((split.weak_leg1, split.weak_leg2), (4, 9));

        let split = classify_legs([3, 3, 3]);
        assert_eq!(split.strong_index, 0);
        assert_eq!((split.weak_leg1, split.weak_leg2), (3, 3));
    }

    #[test]
    fn test_all_zero() {
        let split = classify_legs([0, 0, 0]);
        assert_eq!(split.strong_leg, 0);
        assert_eq!(split.strong_index, 0);
    }

    #[test]
    fn test_strong_leg_last() {
        let split = classify_legs([1, 2, 30]);
        assert_eq!(split.strong_index, 2);
        assert_eq!((split.weak_leg1, split.weak_leg2), (1, 2));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_strong_is_max_and_weak_is_remainder(
                a in 0u64..1_000, b in 0u64..1_000, c in 0u64..1_000
            ) {
                let counts = [a, b, c];
                let split = classify_legs(counts);

                let max = *counts.iter().max().unwrap();
                let first_max = counts.iter().position(|&v| v == max).unwrap();
                prop_assert_eq!(split.strong_leg, max);
                prop_assert_eq!(split.strong_index, first_max);

                let mut expected: Vec<u64> = counts.to_vec();
                expected.remove(first_max);
                let mut got = vec![split.weak_leg1, split.weak_leg2];
                prop_assert_eq!(&got, &expected);

                got.sort_unstable();
                prop_assert!(got.iter().all(|&w| w <= split.strong_leg));
            }
        }
    }
}
