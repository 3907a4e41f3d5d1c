//! Royalty tier types

use serde::{Deserialize, Serialize};

use super::common::amount_string;
use crate::error::{CoreError, CoreResult};

/// Leg counts for one tier, recomputed on every fetch
///
/// By construction `strong_leg >= weak_leg1` and `strong_leg >= weak_leg2`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegProgress {
    pub strong_leg: u64,
    pub weak_leg1: u64,
    pub weak_leg2: u64,
    /// Threshold both the strong leg and the weak-leg sum must reach
    pub required_strong: u64,
    /// Minimum level a downline activation needs to count
    pub required_level: u8,
    /// Informational
    pub total: u64,
}

impl LegProgress {
    pub fn weak_total(&self) -> u64 {
        self.weak_leg1.saturating_add(self.weak_leg2)
    }
}

/// Ledger royalty state for one tier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRoyalty {
    pub achieved: bool,
    pub paid_days: u64,
    pub days_remaining: u64,
    /// Unix seconds
    pub next_claim_time: u64,
    #[serde(with = "amount_string")]
    pub total_earned: u128,
    pub qualified_new: bool,
}

/// Per-user royalty info, one record per tier
///
/// The ledger returns six parallel columns; [`RoyaltyInfo::from_columns`]
/// checks they line up before zipping them. Replaced wholesale on every
/// successful fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoyaltyInfo {
    pub tiers: Vec<TierRoyalty>,
}

impl RoyaltyInfo {
    pub fn from_columns(
        achieved_tiers: Vec<bool>,
        paid_days: Vec<u64>,
        days_remaining: Vec<u64>,
        next_claim_time: Vec<u64>,
        total_earned: Vec<u128>,
        qualified_new_tiers: Vec<bool>,
    ) -> CoreResult<Self> {
        let expected = achieved_tiers.len();
        check_len("paid_days", expected, paid_days.len())?;
        check_len("days_remaining", expected, days_remaining.len())?;
        check_len("next_claim_time", expected, next_claim_time.len())?;
        check_len("total_earned", expected, total_earned.len())?;
        check_len("qualified_new_tiers", expected, qualified_new_tiers.len())?;

        let tiers = achieved_tiers
            .into_iter()
            .zip(paid_days)
            .zip(days_remaining)
            .zip(next_claim_time)
            .zip(total_earned)
            .zip(qualified_new_tiers)
            .map(
                |(((((achieved, paid_days), days_remaining), next_claim_time), total_earned), qualified_new)| {
                    TierRoyalty {
                        achieved,
                        paid_days,
                        days_remaining,
                        next_claim_time,
                        total_earned,
                        qualified_new,
                    }
                },
            )
            .collect();

        Ok(Self { tiers })
    }

    pub fn tier(&self, index: usize) -> Option<&TierRoyalty> {
        self.tiers.get(index)
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

pub(crate) fn check_len(field: &'static str, expected: usize, actual: usize) -> CoreResult<()> {
    if expected != actual {
        return Err(CoreError::LengthMismatch {
            field,
            expected,
            actual,
        });
    }
    Ok(())
}
