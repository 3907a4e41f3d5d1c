//! Royalty tier qualification
//!
//! Combines classified leg counts with the ledger's own qualification and
//! achievement flags into a per-tier view.
//!
//! ```text
//! NotQualified ──▶ Qualified ──▶ Achieved
//! ```
//!
//! `Achieved` is terminal for the lifetime of a client: once a tier has been
//! seen achieved, [`TierStatusLatch`] keeps reporting it achieved even if a
//! later read says otherwise.

use serde::{Deserialize, Serialize};

use crate::constants::{
    MATRIX_WIDTH, ROYALTY_POOL_DAYS, TIER_ACTIVATION_DEPTHS, TIER_COUNT, TIER_DAILY_AMOUNTS,
    TIER_NAMES, TIER_REQUIRED_LEVEL, TIER_REQUIRED_STRONG, TIER_TOTAL,
};
use crate::error::{CoreError, CoreResult};
use crate::legs::classify_legs;
use crate::types::{LegProgress, RoyaltyInfo, TierRoyalty};

/// Static description of one royalty tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSpec {
    pub index: usize,
    pub name: String,
    /// Depth passed to the ledger's activation count query
    pub activation_depth: u32,
    pub required_strong: u64,
    pub required_level: u8,
    pub total: u64,
    /// Raw units paid per day once achieved
    pub daily_amount: u128,
}

impl TierSpec {
    /// Classify branch counts and attach this tier's thresholds
    pub fn progress(&self, counts: [u64; MATRIX_WIDTH]) -> LegProgress {
        let split = classify_legs(counts);
        LegProgress {
            strong_leg: split.strong_leg,
            weak_leg1: split.weak_leg1,
            weak_leg2: split.weak_leg2,
            required_strong: self.required_strong,
            required_level: self.required_level,
            total: self.total,
        }
    }

    /// Total payout of the tier over its full run
    pub fn pool_amount(&self) -> u128 {
        self.daily_amount.saturating_mul(ROYALTY_POOL_DAYS)
    }
}

/// Ordered set of tiers
///
/// Depth constants have differed between deployments, so the table is data
/// rather than code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTable {
    pub tiers: Vec<TierSpec>,
}

impl Default for TierTable {
    fn default() -> Self {
        let tiers = (0..TIER_COUNT)
            .map(|i| TierSpec {
                index: i,
                name: TIER_NAMES[i].to_string(),
                activation_depth: TIER_ACTIVATION_DEPTHS[i],
                required_strong: TIER_REQUIRED_STRONG[i],
                required_level: TIER_REQUIRED_LEVEL[i],
                total: TIER_TOTAL[i],
                daily_amount: TIER_DAILY_AMOUNTS[i],
            })
            .collect();
        Self { tiers }
    }
}

impl TierTable {
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn get(&self, index: usize) -> CoreResult<&TierSpec> {
        self.tiers.get(index).ok_or(CoreError::TierOutOfRange {
            index,
            count: self.tiers.len(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &TierSpec> {
        self.tiers.iter()
    }
}

/// Qualification state of one tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierStatus {
    NotQualified,
    Qualified,
    Achieved,
}

/// Whether the ledger reports tier `index` as achieved
pub fn is_achieved(royalty: Option<&RoyaltyInfo>, index: usize) -> bool {
    royalty
        .and_then(|info| info.tier(index))
        .map(|t| t.achieved)
        .unwrap_or(false)
}

/// Newly qualified: the ledger says qualified and the tier is not yet achieved
pub fn is_qualified(qualified_tiers: &[bool], royalty: Option<&RoyaltyInfo>, index: usize) -> bool {
    qualified_tiers.get(index).copied().unwrap_or(false) && !is_achieved(royalty, index)
}

/// Strong-leg progress in percent, clamped to 100
pub fn strong_leg_progress_pct(progress: &LegProgress) -> f64 {
    clamped_pct(progress.strong_leg, progress.required_strong)
}

/// Weak-leg progress in percent, clamped to 100
///
/// Both weak legs together are measured against the strong-leg threshold.
pub fn weak_leg_progress_pct(progress: &LegProgress) -> f64 {
    clamped_pct(progress.weak_total(), progress.required_strong)
}

fn clamped_pct(value: u64, required: u64) -> f64 {
    if required == 0 {
        return 100.0;
    }
    (value as f64 / required as f64 * 100.0).min(100.0)
}

/// Everything the client derives about one tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierView {
    pub index: usize,
    pub name: String,
    pub status: TierStatus,
    pub progress: LegProgress,
    pub strong_progress_pct: f64,
    pub weak_progress_pct: f64,
    /// Ledger royalty record, absent when the royalty read failed
    pub royalty: Option<TierRoyalty>,
    pub pool_amount: u128,
}

impl TierView {
    pub fn evaluate(
        spec: &TierSpec,
        progress: LegProgress,
        royalty: Option<&RoyaltyInfo>,
        qualified_tiers: &[bool],
    ) -> Self {
        let status = if is_achieved(royalty, spec.index) {
            TierStatus::Achieved
        } else if is_qualified(qualified_tiers, royalty, spec.index) {
            TierStatus::Qualified
        } else {
            TierStatus::NotQualified
        };

        Self {
            index: spec.index,
            name: spec.name.clone(),
            status,
            strong_progress_pct: strong_leg_progress_pct(&progress),
            weak_progress_pct: weak_leg_progress_pct(&progress),
            progress,
            royalty: royalty.and_then(|info| info.tier(spec.index)).cloned(),
            pool_amount: spec.pool_amount(),
        }
    }

    pub fn is_achieved(&self) -> bool {
        self.status == TierStatus::Achieved
    }

    pub fn is_qualified(&self) -> bool {
        self.status == TierStatus::Qualified
    }

    pub fn days_remaining(&self) -> u64 {
        self.royalty.as_ref().map(|r| r.days_remaining).unwrap_or(0)
    }
}

/// Keeps `Achieved` sticky across refreshes
#[derive(Debug, Clone, Default)]
pub struct TierStatusLatch {
    achieved: Vec<bool>,
}

impl TierStatusLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the view's status and return it, upgraded to `Achieved` if the
    /// tier was achieved at any earlier observation
    pub fn observe(&mut self, view: &mut TierView) -> TierStatus {
        if self.achieved.len() <= view.index {
            self.achieved.resize(view.index + 1, false);
        }
        if view.status == TierStatus::Achieved {
            self.achieved[view.index] = true;
        } else if self.achieved[view.index] {
            view.status = TierStatus::Achieved;
        }
        view.status
    }

    pub fn was_achieved(&self, index: usize) -> bool {
        self.achieved.get(index).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn royalty_with(achieved: &[bool]) -> RoyaltyInfo {
        let n = achieved.len();
        RoyaltyInfo::from_columns(
            achieved.to_vec(),
            vec![0; n],
            vec![0; n],
            vec![0; n],
            vec![0; n],
            vec![false; n],
        )
        .unwrap()
    }

    #[test]
    fn test_default_table() {
        let table = TierTable::default();
        assert_eq!(table.len(), 4);
        let t0 = table.get(0).unwrap();
        assert_eq!(t0.activation_depth, 2);
        assert_eq!(t0.required_strong, 3);
        assert_eq!(t0.pool_amount(), 15 * 500 * crate::ONE_TOKEN);
        assert!(table.get(4).is_err());
    }

    #[test]
    fn test_scenario_clamped_progress() {
        let spec = TierSpec {
            required_strong: 10,
            ..TierTable::default().tiers[0].clone()
        };
        let progress = spec.progress([5, 12, 7]);

        assert_eq!(progress.strong_leg, 12);
        assert_eq!((progress.weak_leg1, progress.weak_leg2), (5, 7));
        assert_eq!(strong_leg_progress_pct(&progress), 100.0);
        assert_eq!(weak_leg_progress_pct(&progress), 100.0);
    }

    #[test]
    fn test_partial_progress() {
        let spec = &TierTable::default().tiers[1]; // required_strong = 4
        let progress = spec.progress([1, 2, 0]);
        assert_eq!(strong_leg_progress_pct(&progress), 50.0);
        assert_eq!(weak_leg_progress_pct(&progress), 25.0);
    }

    #[test]
    fn test_zero_threshold_is_complete() {
        let progress = LegProgress::default();
        assert_eq!(strong_leg_progress_pct(&progress), 100.0);
    }

    #[test]
    fn test_achieved_is_never_qualified() {
        let royalty = royalty_with(&[true, false]);
        assert!(is_achieved(Some(&royalty), 0));
        assert!(!is_qualified(&[true, true], Some(&royalty), 0));
        assert!(is_qualified(&[true, true], Some(&royalty), 1));
    }

    #[test]
    fn test_missing_data_is_not_qualified() {
        assert!(!is_achieved(None, 0));
        assert!(!is_qualified(&[], None, 0));
        assert!(is_qualified(&[true], None, 0));
    }

    #[test]
    fn test_view_status() {
        let table = TierTable::default();
        let royalty = royalty_with(&[true, false, false, false]);
        let qualified = [true, true, false, false];

        let views: Vec<TierView> = table
            .iter()
            .map(|spec| TierView::evaluate(spec, spec.progress([0, 0, 0]), Some(&royalty), &qualified))
            .collect();

        assert_eq!(views[0].status, TierStatus::Achieved);
        assert_eq!(views[1].status, TierStatus::Qualified);
        assert_eq!(views[2].status, TierStatus::NotQualified);
        assert!(views[0].royalty.is_some());
    }

    #[test]
    fn test_latch_keeps_achieved() {
        let table = TierTable::default();
        let spec = &table.tiers[2];
        let mut latch = TierStatusLatch::new();

        let royalty = royalty_with(&[false, false, true, false]);
        let mut view = TierView::evaluate(spec, spec.progress([9, 9, 9]), Some(&royalty), &[]);
        assert_eq!(latch.observe(&mut view), TierStatus::Achieved);

        // A later read without the flag (or a failed read) must not regress
        let mut view = TierView::evaluate(spec, spec.progress([0, 0, 0]), None, &[false, false, true]);
        assert_eq!(latch.observe(&mut view), TierStatus::Achieved);
        assert!(view.is_achieved());
        assert!(!view.is_qualified());
        assert!(latch.was_achieved(2));
        assert!(!latch.was_achieved(0));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_progress_clamped(
                a in 0u64..10_000, b in 0u64..10_000, c in 0u64..10_000, req in 0u64..50
            ) {
                let spec = TierSpec { required_strong: req, ..TierTable::default().tiers[0].clone() };
                let progress = spec.progress([a, b, c]);
                let s = strong_leg_progress_pct(&progress);
                let w = weak_leg_progress_pct(&progress);
                prop_assert!((0.0..=100.0).contains(&s));
                prop_assert!((0.0..=100.0).contains(&w));
            }

            #[test]
            fn prop_achieved_excludes_qualified(
                achieved in proptest::collection::vec(any::<bool>(), 0..6),
                qualified in proptest::collection::vec(any::<bool>(), 0..6),
                index in 0usize..6
            ) {
                let royalty = royalty_with(&achieved);
                if is_achieved(Some(&royalty), index) {
                    prop_assert!(!is_qualified(&qualified, Some(&royalty), index));
                }
            }
        }
    }
}
