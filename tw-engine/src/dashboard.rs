//! Participant dashboard
//!
//! The display panels for one participant: royalty tiers, lifetime income,
//! rank income and the referral code. Each panel is a [`ViewCell`] loaded
//! under a single [`ViewScope`], so switching to another participant or
//! closing the dashboard discards any fetch still in flight.

use serde::Serialize;
use tracing::debug;

use tw_core::{Address, IncomeSummary, RankIncome};

use crate::royalty::RoyaltySnapshot;
use crate::view::{ViewCell, ViewScope};
use crate::TwClient;

/// What the dashboard currently shows
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardView {
    pub royalty: Option<RoyaltySnapshot>,
    pub income: Option<IncomeSummary>,
    pub rank_income: Option<RankIncome>,
    pub referral_code: Option<String>,
}

#[derive(Default)]
pub struct Dashboard {
    scope: ViewScope,
    royalty: ViewCell<RoyaltySnapshot>,
    income: ViewCell<Option<IncomeSummary>>,
    rank_income: ViewCell<Option<RankIncome>>,
    referral_code: ViewCell<Option<String>>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every panel for `address`; returns how many results were applied
    pub async fn refresh(&self, client: &TwClient, address: &Address) -> usize {
        let applied = tokio::join!(
            self.royalty.load(&self.scope, client.royalty(address)),
            self.income.load(&self.scope, client.income_summary(address)),
            self.rank_income.load(&self.scope, client.rank_income(address)),
            self.referral_code.load(&self.scope, client.referral_code(address)),
        );
        let count = [applied.0, applied.1, applied.2, applied.3]
            .iter()
            .filter(|a| **a)
            .count();
        debug!(address = %address, applied = count, "Dashboard refreshed");
        count
    }

    /// Forget the shown participant; fetches started before this are dropped
    pub fn switch(&self) {
        self.scope.invalidate();
        self.royalty.clear();
        self.income.clear();
        self.rank_income.clear();
        self.referral_code.clear();
    }

    /// Stop applying results for good
    pub fn close(&self) {
        self.scope.close();
    }

    pub fn view(&self) -> DashboardView {
        DashboardView {
            royalty: self.royalty.get(),
            income: self.income.get().flatten(),
            rank_income: self.rank_income.get().flatten(),
            referral_code: self.referral_code.get().flatten(),
        }
    }
}
