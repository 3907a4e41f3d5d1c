//! Direct referral and rank income types

use serde::{Deserialize, Serialize};

use super::common::{amount_string, Address};

/// A participant the queried address referred directly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectReferral {
    pub address: Address,
    /// Unix seconds of the registration
    pub activation_time: u64,
    pub current_level: u8,
    pub direct_referrals: u32,
}

/// One page of direct referrals, in the ledger's order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralPage {
    pub entries: Vec<DirectReferral>,
    pub total_count: u64,
}

impl ReferralPage {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.entries.iter().map(|e| e.address).collect()
    }

    /// Number of pages at `items_per_page`, at least 1
    pub fn total_pages(&self, items_per_page: u64) -> u64 {
        if items_per_page == 0 {
            return 1;
        }
        self.total_count.div_ceil(items_per_page).max(1)
    }
}

/// Income earned from one matrix level of the team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelIncome {
    pub level: u8,
    #[serde(with = "amount_string")]
    pub amount: u128,
}

/// Per-level team income plus the direct referral commission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankIncome {
    pub level_incomes: Vec<LevelIncome>,
    #[serde(with = "amount_string")]
    pub direct_commission: u128,
}

impl RankIncome {
    /// Sum of all level incomes, without the direct commission
    pub fn level_total(&self) -> u128 {
        self.level_incomes
            .iter()
            .fold(0u128, |acc, l| acc.saturating_add(l.amount))
    }

    pub fn total(&self) -> u128 {
        self.level_total().saturating_add(self.direct_commission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_income_totals() {
        let income = RankIncome {
            level_incomes: vec![
                LevelIncome { level: 1, amount: 10 },
                LevelIncome { level: 2, amount: 5 },
            ],
            direct_commission: 7,
        };
        assert_eq!(income.level_total(), 15);
        assert_eq!(income.total(), 22);
        assert_eq!(RankIncome::default().total(), 0);
    }

    #[test]
    fn test_referral_page_counts() {
        let page = ReferralPage {
            entries: vec![],
            total_count: 11,
        };
        assert_eq!(page.total_pages(5), 3);
        assert_eq!(ReferralPage::empty().total_pages(5), 1);
    }

    #[test]
    fn test_level_income_amount_is_string() {
        let json = serde_json::to_value(LevelIncome { level: 3, amount: 1 }).unwrap();
        assert_eq!(json["amount"], "1");
    }
}
