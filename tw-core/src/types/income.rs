//! Income event types
//!
//! Events are emitted by the ledger and never mutated by the client; the
//! client only reorders, filters and slices a fetched snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::common::{amount_string, Address};
use crate::error::CoreError;

/// Kind of income an event records, with its ledger code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeType {
    DirectReferral,
    UpgradeReferral,
    LevelIncome,
    BonusIncome,
}

impl IncomeType {
    pub const ALL: [IncomeType; 4] = [
        IncomeType::DirectReferral,
        IncomeType::UpgradeReferral,
        IncomeType::LevelIncome,
        IncomeType::BonusIncome,
    ];

    /// Ledger code
    pub fn code(&self) -> u8 {
        match self {
            IncomeType::DirectReferral => 0,
            IncomeType::UpgradeReferral => 1,
            IncomeType::LevelIncome => 2,
            IncomeType::BonusIncome => 3,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, CoreError> {
        match code {
            0 => Ok(IncomeType::DirectReferral),
            1 => Ok(IncomeType::UpgradeReferral),
            2 => Ok(IncomeType::LevelIncome),
            3 => Ok(IncomeType::BonusIncome),
            other => Err(CoreError::UnknownIncomeType(other)),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IncomeType::DirectReferral => "Direct Referral",
            IncomeType::UpgradeReferral => "Upgrade Referral",
            IncomeType::LevelIncome => "Level Income",
            IncomeType::BonusIncome => "Bonus Income",
        }
    }
}

impl fmt::Display for IncomeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for IncomeType {
    type Err = CoreError;

    /// Accepts the ledger code or a snake_case / kebab-case name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(code) = s.parse::<u8>() {
            return Self::from_code(code);
        }
        match s.to_lowercase().replace('-', "_").as_str() {
            "direct_referral" | "direct" => Ok(IncomeType::DirectReferral),
            "upgrade_referral" | "upgrade" => Ok(IncomeType::UpgradeReferral),
            "level_income" | "level" => Ok(IncomeType::LevelIncome),
            "bonus_income" | "bonus" | "magic" => Ok(IncomeType::BonusIncome),
            _ => Err(CoreError::UnknownIncomeType(u8::MAX)),
        }
    }
}

/// A single income event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeEvent {
    /// Participant whose activity produced the income
    pub address: Address,
    pub level_number: u8,
    #[serde(with = "amount_string")]
    pub amount: u128,
    /// Unix seconds
    pub timestamp: u64,
    pub income_type: IncomeType,
}

/// One page of income events
///
/// `total_count` is the ledger-reported total and is not tied to the number
/// of events fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomePage {
    pub events: Vec<IncomeEvent>,
    pub total_count: u64,
}

impl IncomePage {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of pages at `items_per_page`, at least 1
    pub fn total_pages(&self, items_per_page: u64) -> u64 {
        if items_per_page == 0 {
            return 1;
        }
        self.total_count.div_ceil(items_per_page).max(1)
    }
}
