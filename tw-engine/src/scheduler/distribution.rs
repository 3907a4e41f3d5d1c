//! Automatic royalty distribution
//!
//! Before distributing tier `i` the ledger's `getNextDistributionTime(i)` is
//! read. When `now` is earlier the tier is skipped without a write. A failed
//! read also skips the tier, since distributing blind could only revert.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tw_core::Address;

use super::{now_secs, ScheduledTask, SchedulerHandle};
use crate::error::EngineResult;
use crate::ledger::{Ledger, TxHash};
use crate::royalty::RoyaltyTracker;
use crate::signer::PrivilegedGateway;

/// Which tiers a distribution tick considers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistributionTargets {
    /// A fixed list of tier indices
    Tiers(Vec<usize>),
    /// Tiers the participant has achieved and still has payout days for
    Participant(Address),
}

/// Outcome of one distribution tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionReport {
    /// Tiers whose distribution time has not been reached
    pub not_due: Vec<usize>,
    /// Tiers whose distribution time could not be read
    pub unreadable: Vec<usize>,
    pub distributed: Vec<(usize, TxHash)>,
    pub failed: Vec<usize>,
}

impl DistributionReport {
    pub fn write_attempts(&self) -> usize {
        self.distributed.len() + self.failed.len()
    }
}

pub struct DistributionScheduler {
    ledger: Arc<dyn Ledger>,
    gateway: Arc<dyn PrivilegedGateway>,
    tracker: Arc<RoyaltyTracker>,
    targets: DistributionTargets,
    tick_lock: Mutex<()>,
}

impl DistributionScheduler {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        gateway: Arc<dyn PrivilegedGateway>,
        tracker: Arc<RoyaltyTracker>,
        targets: DistributionTargets,
    ) -> Self {
        Self {
            ledger,
            gateway,
            tracker,
            targets,
            tick_lock: Mutex::new(()),
        }
    }

    pub fn targets(&self) -> &DistributionTargets {
        &self.targets
    }

    pub fn start(self: Arc<Self>, period: Duration) -> SchedulerHandle {
        super::start(self, period)
    }

    /// Distribute every target tier whose time has come, `now_secs` in unix seconds
    pub async fn tick(&self, now_secs: u64) -> DistributionReport {
        let _guard = self.tick_lock.lock().await;
        let mut report = DistributionReport::default();

        for tier in self.resolve_tiers().await {
            let next = match self.ledger.next_distribution_time(tier).await {
                Ok(t) => t,
                Err(e) => {
                    warn!(tier, error = %e, "Distribution time read failed, tier skipped");
                    report.unreadable.push(tier);
                    continue;
                }
            };

            if now_secs < next {
                debug!(tier, now = now_secs, next, "Distribution not due");
                report.not_due.push(tier);
                continue;
            }

            match self.distribute(tier).await {
                Ok(tx) => {
                    info!(tier, tx = %tx, "Tier royalties distributed");
                    report.distributed.push((tier, tx));
                }
                Err(e) => {
                    warn!(tier, error = %e, "Tier distribution failed");
                    report.failed.push(tier);
                }
            }
        }

        report
    }

    async fn resolve_tiers(&self) -> Vec<usize> {
        match &self.targets {
            DistributionTargets::Tiers(tiers) => tiers.clone(),
            DistributionTargets::Participant(address) => {
                self.tracker.refresh(address).await.payable_indices()
            }
        }
    }

    async fn distribute(&self, tier: usize) -> EngineResult<TxHash> {
        let tx = self.gateway.distribute_tier_royalties(tier).await?;
        self.ledger.wait_for_receipt(&tx).await?.ensure_success()?;
        Ok(tx)
    }
}

#[async_trait]
impl ScheduledTask for DistributionScheduler {
    fn name(&self) -> &'static str {
        "distribution"
    }

    async fn run_tick(&self) {
        let report = self.tick(now_secs()).await;
        debug!(?report, "Distribution tick finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{MockLedger, WriteCall};
    use tw_core::{RoyaltyInfo, TierTable};

    fn addr(b: u8) -> Address {
        Address([b; 20])
    }

    fn scheduler(ledger: &Arc<MockLedger>, targets: DistributionTargets) -> DistributionScheduler {
        let tracker = Arc::new(RoyaltyTracker::new(ledger.clone(), TierTable::default()));
        DistributionScheduler::new(ledger.clone(), ledger.clone(), tracker, targets)
    }

    #[tokio::test]
    async fn test_not_due_issues_no_writes() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_next_distribution_time(0, 2000);

        let report = scheduler(&ledger, DistributionTargets::Tiers(vec![0]))
            .tick(1000)
            .await;
        assert_eq!(report.not_due, vec![0]);
        assert_eq!(report.write_attempts(), 0);
        assert_eq!(ledger.write_count(), 0);
    }

    #[tokio::test]
    async fn test_due_tiers_are_distributed() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_next_distribution_time(0, 1000);
        ledger.set_next_distribution_time(1, 5000);

        let report = scheduler(&ledger, DistributionTargets::Tiers(vec![0, 1]))
            .tick(1000)
            .await;
        assert_eq!(report.distributed.len(), 1);
        assert_eq!(report.not_due, vec![1]);
        assert_eq!(
            ledger.writes(),
            vec![WriteCall::DistributeTierRoyalties { tier: 0 }]
        );
    }

    #[tokio::test]
    async fn test_unreadable_time_skips_and_failures_are_swallowed() {
        let ledger = Arc::new(MockLedger::new());
        ledger.fail_read("getNextDistributionTime");

        let s = scheduler(&ledger, DistributionTargets::Tiers(vec![0, 1]));
        let report = s.tick(1000).await;
        assert_eq!(report.unreadable, vec![0, 1]);
        assert_eq!(ledger.write_count(), 0);

        ledger.clear_failures();
        ledger.fail_write("distributeTierRoyalties", "execution reverted: too early");
        let report = s.tick(1000).await;
        assert_eq!(report.failed, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_participant_targets_follow_snapshot() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_royalty_info(
            addr(1),
            RoyaltyInfo::from_columns(
                vec![true, true, false, false],
                vec![0; 4],
                vec![20, 0, 0, 0],
                vec![0; 4],
                vec![0; 4],
                vec![false; 4],
            )
            .unwrap(),
        );

        let report = scheduler(&ledger, DistributionTargets::Participant(addr(1)))
            .tick(1000)
            .await;
        // tier 1 is achieved but has no payout days left
        assert_eq!(report.distributed.len(), 1);
        assert_eq!(report.distributed[0].0, 0);
    }
}
