//! Automatic tier registration
//!
//! On each tick the participant's tiers are refreshed. Every tier that is
//! qualified but not achieved, and whose cooldown has elapsed, is claimed in
//! the cooldown store. The claim records `now` before the registration call
//! is issued and is never rolled back, so a failed attempt still waits out
//! the cooldown.
//!
//! `registerQualifiedTiers` covers every qualified tier at once, so one tick
//! issues at most one call no matter how many tiers it claimed.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tw_core::Address;

use super::{now_ms, ScheduledTask, SchedulerHandle};
use crate::error::EngineResult;
use crate::ledger::{Ledger, TxHash};
use crate::royalty::RoyaltyTracker;
use crate::signer::PrivilegedGateway;
use crate::storage::CooldownStore;

/// Outcome of one registration tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    /// Tiers claimed this tick
    pub attempted: Vec<usize>,
    /// Qualified tiers still inside their cooldown
    pub cooling_down: Vec<usize>,
    pub tx_hash: Option<TxHash>,
    /// The registration call was confirmed successful
    pub confirmed: bool,
}

pub struct RegistrationScheduler {
    tracker: Arc<RoyaltyTracker>,
    gateway: Arc<dyn PrivilegedGateway>,
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn CooldownStore>,
    participant: Address,
    cooldown: Duration,
    tick_lock: Mutex<()>,
}

impl RegistrationScheduler {
    pub fn new(
        tracker: Arc<RoyaltyTracker>,
        gateway: Arc<dyn PrivilegedGateway>,
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn CooldownStore>,
        participant: Address,
        cooldown: Duration,
    ) -> Self {
        Self {
            tracker,
            gateway,
            ledger,
            store,
            participant,
            cooldown,
            tick_lock: Mutex::new(()),
        }
    }

    pub fn participant(&self) -> &Address {
        &self.participant
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn start(self: Arc<Self>, period: Duration) -> SchedulerHandle {
        super::start(self, period)
    }

    /// Evaluate every tier at `now_ms` and register what is due
    pub async fn tick(&self, now_ms: u64) -> RegistrationReport {
        // overlapping ticks would read the same snapshot
        let _guard = self.tick_lock.lock().await;
        let mut report = RegistrationReport::default();

        let snapshot = self.tracker.refresh(&self.participant).await;
        let due = snapshot.qualified_indices();
        if due.is_empty() {
            debug!(address = %self.participant, "No newly qualified tiers");
            return report;
        }

        for tier in due {
            match self.store.try_claim(tier, now_ms, self.cooldown).await {
                Ok(true) => report.attempted.push(tier),
                Ok(false) => report.cooling_down.push(tier),
                Err(e) => {
                    warn!(address = %self.participant, tier, error = %e, "Cooldown store unavailable, tier skipped");
                }
            }
        }

        if !report.cooling_down.is_empty() {
            debug!(address = %self.participant, tiers = ?report.cooling_down, "Tiers inside registration cooldown");
        }
        if report.attempted.is_empty() {
            return report;
        }

        info!(address = %self.participant, tiers = ?report.attempted, "Registering qualified tiers");
        match self.register().await {
            Ok(tx) => {
                report.tx_hash = Some(tx);
                report.confirmed = true;
                info!(address = %self.participant, tx = %tx, "Tier registration confirmed");
            }
            Err(e) => {
                warn!(
                    address = %self.participant,
                    tiers = ?report.attempted,
                    error = %e,
                    "Tier registration failed"
                );
            }
        }
        report
    }

    async fn register(&self) -> EngineResult<TxHash> {
        let tx = self.gateway.register_qualified_tiers(&self.participant).await?;
        self.ledger.wait_for_receipt(&tx).await?.ensure_success()?;
        Ok(tx)
    }
}

#[async_trait]
impl ScheduledTask for RegistrationScheduler {
    fn name(&self) -> &'static str {
        "registration"
    }

    async fn run_tick(&self) {
        let report = self.tick(now_ms()).await;
        debug!(?report, "Registration tick finished");
    }
}
