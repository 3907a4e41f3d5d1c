//! Royalty tier tracking
//!
//! Collects everything needed to evaluate a participant's tiers in one
//! refresh: the ledger's qualification flags, the royalty record, the
//! achievers count and per-tier branch activations. Every read degrades on
//! failure, so a refresh always produces a snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use tw_core::{Address, RoyaltyInfo, TierStatusLatch, TierTable, TierView, MATRIX_WIDTH};

use crate::ledger::Ledger;

/// Evaluated tier state for one participant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoyaltySnapshot {
    pub address: Address,
    /// Raw ledger qualification flags, empty when the read failed
    pub qualified_tiers: Vec<bool>,
    /// `None` when the royalty read failed
    pub royalty_info: Option<RoyaltyInfo>,
    /// Achievers per tier, zeros when the read failed
    pub achievers_count: Vec<u64>,
    pub tiers: Vec<TierView>,
    pub fetched_at: DateTime<Utc>,
}

impl RoyaltySnapshot {
    pub fn tier(&self, index: usize) -> Option<&TierView> {
        self.tiers.get(index)
    }

    /// Tiers qualified but not yet achieved
    pub fn qualified_indices(&self) -> Vec<usize> {
        self.tiers
            .iter()
            .filter(|t| t.is_qualified())
            .map(|t| t.index)
            .collect()
    }

    /// Achieved tiers that still have payout days left
    pub fn payable_indices(&self) -> Vec<usize> {
        self.tiers
            .iter()
            .filter(|t| t.is_achieved() && t.days_remaining() > 0)
            .map(|t| t.index)
            .collect()
    }
}

/// Refreshes tier state and keeps `Achieved` sticky per participant
///
/// One latch is kept for every participant refreshed and lives until
/// [`RoyaltyTracker::forget`] is called for it.
pub struct RoyaltyTracker {
    ledger: Arc<dyn Ledger>,
    tiers: TierTable,
    latches: Mutex<HashMap<Address, TierStatusLatch>>,
}

impl RoyaltyTracker {
    pub fn new(ledger: Arc<dyn Ledger>, tiers: TierTable) -> Self {
        Self {
            ledger,
            tiers,
            latches: Mutex::new(HashMap::new()),
        }
    }

    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    /// Drop the sticky state of `address`; returns whether any was held
    pub async fn forget(&self, address: &Address) -> bool {
        self.latches.lock().await.remove(address).is_some()
    }

    /// Participants with sticky state
    pub async fn tracked(&self) -> usize {
        self.latches.lock().await.len()
    }

    pub async fn refresh(&self, address: &Address) -> RoyaltySnapshot {
        let (qualified, royalty, achievers) = tokio::join!(
            self.ledger.check_qualification(address),
            self.ledger.user_royalty_info(address),
            self.ledger.tier_achievers_count(),
        );

        let qualified_tiers = qualified.unwrap_or_else(|e| {
            warn!(address = %address, error = %e, "Qualification read failed");
            Vec::new()
        });
        let royalty_info = match royalty {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(address = %address, error = %e, "Royalty info read failed");
                None
            }
        };
        let achievers_count = achievers.unwrap_or_else(|e| {
            debug!(error = %e, "Achievers count read failed");
            vec![0; self.tiers.len()]
        });

        let mut views = Vec::with_capacity(self.tiers.len());
        for spec in self.tiers.iter() {
            let counts = match self
                .ledger
                .level_activated_count(address, spec.activation_depth)
                .await
            {
                Ok(c) => c,
                Err(e) => {
                    debug!(address = %address, tier = spec.index, error = %e, "Activation count read failed");
                    [0; MATRIX_WIDTH]
                }
            };
            views.push(TierView::evaluate(
                spec,
                spec.progress(counts),
                royalty_info.as_ref(),
                &qualified_tiers,
            ));
        }

        {
            let mut latches = self.latches.lock().await;
            let latch = latches.entry(*address).or_default();
            for view in views.iter_mut() {
                latch.observe(view);
            }
        }

        RoyaltySnapshot {
            address: *address,
            qualified_tiers,
            royalty_info,
            achievers_count,
            tiers: views,
            fetched_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MockLedger;
    use tw_core::TierStatus;

    fn addr(b: u8) -> Address {
        Address([b; 20])
    }

    fn royalty(achieved: [bool; 4], days_remaining: [u64; 4]) -> RoyaltyInfo {
        RoyaltyInfo::from_columns(
            achieved.to_vec(),
            vec![0; 4],
            days_remaining.to_vec(),
            vec![0; 4],
            vec![0; 4],
            vec![false; 4],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_refresh_builds_views() {
        let ledger = Arc::new(MockLedger::new());
        let user = addr(1);
        ledger.set_qualification(user, vec![true, true, false, false]);
        ledger.set_royalty_info(user, royalty([true, false, false, false], [400, 0, 0, 0]));
        ledger.set_activations(user, 3, [1, 6, 2]);
        ledger.set_achievers(vec![9, 4, 1, 0]);

        let tracker = RoyaltyTracker::new(ledger.clone(), TierTable::default());
        let snap = tracker.refresh(&user).await;

        assert_eq!(snap.tiers.len(), 4);
        assert_eq!(snap.tiers[0].status, TierStatus::Achieved);
        assert_eq!(snap.tiers[1].status, TierStatus::Qualified);
        assert_eq!(snap.tiers[1].progress.strong_leg, 6);
        assert_eq!(snap.tiers[1].strong_progress_pct, 100.0);
        assert_eq!(snap.tiers[1].weak_progress_pct, 75.0);
        assert_eq!(snap.qualified_indices(), vec![1]);
        assert_eq!(snap.payable_indices(), vec![0]);
        assert_eq!(snap.achievers_count, vec![9, 4, 1, 0]);
    }

    #[tokio::test]
    async fn test_refresh_degrades_on_failures() {
        let ledger = Arc::new(MockLedger::new());
        ledger.fail_read("checkQualification");
        ledger.fail_read("getUserRoyaltyInfo");
        ledger.fail_read("getTierAchieversCount");
        ledger.fail_read("getLevelActivatedCount");

        let tracker = RoyaltyTracker::new(ledger.clone(), TierTable::default());
        let snap = tracker.refresh(&addr(1)).await;

        assert!(snap.qualified_tiers.is_empty());
        assert!(snap.royalty_info.is_none());
        assert_eq!(snap.achievers_count, vec![0; 4]);
        assert!(snap.tiers.iter().all(|t| t.status == TierStatus::NotQualified));
        assert!(snap.tiers.iter().all(|t| t.progress.strong_leg == 0));
    }

    #[tokio::test]
    async fn test_achieved_survives_later_failed_read() {
        let ledger = Arc::new(MockLedger::new());
        let user = addr(1);
        ledger.set_royalty_info(user, royalty([false, false, true, false], [0, 0, 10, 0]));

        let tracker = RoyaltyTracker::new(ledger.clone(), TierTable::default());
        assert!(tracker.refresh(&user).await.tiers[2].is_achieved());

        ledger.fail_read("getUserRoyaltyInfo");
        ledger.set_qualification(user, vec![false, false, true, false]);
        let snap = tracker.refresh(&user).await;
        assert!(snap.tiers[2].is_achieved());
        assert!(snap.qualified_indices().is_empty());

        // other participants have their own latch
        assert!(!tracker.refresh(&addr(2)).await.tiers[2].is_achieved());
    }

    #[tokio::test]
    async fn test_forget_releases_latch() {
        let ledger = Arc::new(MockLedger::new());
        let user = addr(1);
        ledger.set_royalty_info(user, royalty([false, false, true, false], [0, 0, 10, 0]));

        let tracker = RoyaltyTracker::new(ledger.clone(), TierTable::default());
        tracker.refresh(&user).await;
        tracker.refresh(&addr(2)).await;
        assert_eq!(tracker.tracked().await, 2);

        assert!(tracker.forget(&user).await);
        assert!(!tracker.forget(&user).await);
        assert_eq!(tracker.tracked().await, 1);

        // without the latch the failed read no longer keeps the tier achieved
        ledger.fail_read("getUserRoyaltyInfo");
        assert!(!tracker.refresh(&user).await.tiers[2].is_achieved());
    }
}
