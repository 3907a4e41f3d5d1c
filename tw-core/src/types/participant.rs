//! Participant and sponsor types

use serde::{Deserialize, Serialize};

use super::common::{amount_string, Address};
use crate::constants::level_name;

/// A matrix participant as the client sees it
///
/// `current_level` 0 means the address has never registered. The sponsor
/// addresses are references into the tree, not owned records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub address: Address,
    pub current_level: u8,
    pub direct_sponsor: Address,
    pub matrix_sponsor: Address,
}

impl Participant {
    pub fn is_registered(&self) -> bool {
        self.current_level > 0
    }

    pub fn level_name(&self) -> &'static str {
        level_name(self.current_level)
    }
}

/// Single-hop sponsor lookup result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sponsors {
    /// Who referred the participant
    pub direct_sponsor: Address,
    /// Where the participant was placed in the matrix (may differ on spillover)
    pub matrix_sponsor: Address,
}

/// Lifetime income totals reported by the ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeSummary {
    #[serde(with = "amount_string")]
    pub total_income: u128,
    #[serde(with = "amount_string")]
    pub referral_income: u128,
    #[serde(with = "amount_string")]
    pub level_income: u128,
    #[serde(with = "amount_string")]
    pub upgrade_referral_income: u128,
    #[serde(with = "amount_string")]
    pub bonus_income: u128,
    pub total_team_size: u64,
    pub direct_referrals: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_registration() {
        let p = Participant {
            address: Address([1; 20]),
            current_level: 0,
            direct_sponsor: Address::ZERO,
            matrix_sponsor: Address::ZERO,
        };
        assert!(!p.is_registered());
        assert_eq!(p.level_name(), "Not Registered");

        let p = Participant { current_level: 3, ..p };
        assert!(p.is_registered());
        assert_eq!(p.level_name(), "Adventure");
    }

    #[test]
    fn test_income_summary_amounts_as_strings() {
        let summary = IncomeSummary {
            total_income: 12_000_000_000_000_000_000,
            ..Default::default()
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["total_income"], "12000000000000000000");
    }
}
