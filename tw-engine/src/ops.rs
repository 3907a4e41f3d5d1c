//! Participant write operations
//!
//! Registration and level upgrades. Each is strictly sequential:
//!
//! ```text
//! balance check -> allowance check -> approve? -> receipt -> write -> receipt
//! ```
//!
//! Preconditions are checked before anything is submitted and fail with
//! [`EngineError::Validation`]. Once a write is submitted every failure
//! propagates: rejected calls as classified [`EngineError::Write`], mined
//! but reverted calls as [`EngineError::ReceiptFailed`].

use std::sync::Arc;
use tracing::{debug, info, warn};

use tw_core::{level_cost, to_display, Address, MAX_LEVEL, REGISTRATION_COST, REGISTRATION_LEVEL};

use crate::backend::{fetch_profile_with_retry, ProfileService, UserProfile};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::ledger::{Ledger, TxHash};
use crate::retry::RetryStrategy;

/// Result of a confirmed registration
#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    pub approve_tx: Option<TxHash>,
    pub register_tx: TxHash,
    /// Backend profile, `None` when no backend is attached or it never caught up
    pub profile: Option<UserProfile>,
}

/// Result of a confirmed upgrade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeOutcome {
    pub approve_tx: Option<TxHash>,
    pub upgrade_tx: TxHash,
    pub level: u8,
}

pub struct ParticipantOps {
    ledger: Arc<dyn Ledger>,
    profiles: Option<Arc<dyn ProfileService>>,
    approve_amount: u128,
    profile_retry: RetryStrategy,
    profile_max_attempts: u32,
}

impl ParticipantOps {
    pub fn new(ledger: Arc<dyn Ledger>, config: &EngineConfig) -> Self {
        Self {
            ledger,
            profiles: None,
            approve_amount: config.registration_approve_amount,
            profile_retry: config.backend.profile_retry.clone(),
            profile_max_attempts: config.backend.profile_max_attempts,
        }
    }

    /// Mirror registrations to the backend profile service
    pub fn with_profiles(mut self, profiles: Arc<dyn ProfileService>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    /// Register `user` under `referrer`
    ///
    /// `referral_id` is the referrer's backend display id; when given, the
    /// backend records the referral. Backend failures are logged and do not
    /// fail a registration the ledger already confirmed.
    pub async fn register(
        &self,
        user: &Address,
        referrer: &Address,
        referral_id: Option<&str>,
    ) -> EngineResult<RegistrationOutcome> {
        if referrer == user {
            return Err(EngineError::Validation(
                "a participant cannot refer themselves".into(),
            ));
        }
        let level = self.ledger.current_level(user).await?;
        if level >= REGISTRATION_LEVEL {
            return Err(EngineError::Validation(format!(
                "{} is already registered (level {})",
                user, level
            )));
        }

        let approve_tx = self
            .prepare_payment(user, REGISTRATION_COST, self.approve_amount.max(REGISTRATION_COST))
            .await?;

        info!(address = %user, referrer = %referrer, "Submitting registration");
        let register_tx = self.ledger.register(user, referrer).await?;
        self.ledger
            .wait_for_receipt(&register_tx)
            .await?
            .ensure_success()?;
        info!(address = %user, tx = %register_tx, "Registration confirmed");

        let profile = self.sync_profile(user, referral_id).await;

        Ok(RegistrationOutcome {
            approve_tx,
            register_tx,
            profile,
        })
    }

    /// Upgrade `user` to `target_level`
    pub async fn upgrade(&self, user: &Address, target_level: u8) -> EngineResult<UpgradeOutcome> {
        let cost = match level_cost(target_level) {
            Some(c) if target_level > REGISTRATION_LEVEL => c,
            _ => {
                return Err(EngineError::Validation(format!(
                    "upgrade level must be between {} and {}, got {}",
                    REGISTRATION_LEVEL + 1,
                    MAX_LEVEL,
                    target_level
                )))
            }
        };

        let current = self.ledger.current_level(user).await?;
        if current < REGISTRATION_LEVEL {
            return Err(EngineError::Validation(format!("{} is not registered", user)));
        }
        if target_level <= current {
            return Err(EngineError::Validation(format!(
                "{} is already at level {}",
                user, current
            )));
        }

        let approve_tx = self.prepare_payment(user, cost, cost).await?;

        info!(address = %user, level = target_level, "Submitting upgrade");
        let upgrade_tx = self.ledger.upgrade(user, target_level).await?;
        self.ledger
            .wait_for_receipt(&upgrade_tx)
            .await?
            .ensure_success()?;
        info!(address = %user, level = target_level, tx = %upgrade_tx, "Upgrade confirmed");

        Ok(UpgradeOutcome {
            approve_tx,
            upgrade_tx,
            level: target_level,
        })
    }

    /// Check the balance, then approve `approve` if the allowance is below `cost`
    async fn prepare_payment(
        &self,
        owner: &Address,
        cost: u128,
        approve: u128,
    ) -> EngineResult<Option<TxHash>> {
        let balance = self.ledger.token_balance(owner).await?;
        if balance < cost {
            return Err(EngineError::Validation(format!(
                "Insufficient balance: need {}, have {}",
                to_display(Some(cost)),
                to_display(Some(balance))
            )));
        }

        let allowance = self.ledger.token_allowance(owner).await?;
        if allowance >= cost {
            debug!(address = %owner, allowance, cost, "Allowance sufficient");
            return Ok(None);
        }

        info!(address = %owner, amount = %to_display(Some(approve)), "Approving token spend");
        let tx = self.ledger.approve(owner, approve).await?;
        self.ledger.wait_for_receipt(&tx).await?.ensure_success()?;
        debug!(address = %owner, tx = %tx, "Approval confirmed");
        Ok(Some(tx))
    }

    async fn sync_profile(&self, user: &Address, referral_id: Option<&str>) -> Option<UserProfile> {
        let profiles = self.profiles.as_ref()?;

        let registered = match referral_id {
            Some(id) => profiles.register_with_referral(user, id).await,
            None => profiles.register(user).await,
        };
        if let Err(e) = registered {
            warn!(address = %user, error = %e, "Backend registration failed");
        }

        match fetch_profile_with_retry(
            profiles.as_ref(),
            user,
            &self.profile_retry,
            self.profile_max_attempts,
        )
        .await
        {
            Ok(profile) => profile,
            Err(e) => {
                warn!(address = %user, error = %e, "Profile fetch failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryProfileService;
    use crate::ledger::{MockLedger, WriteCall};
    use tw_core::{FailureCause, ONE_TOKEN};

    fn addr(b: u8) -> Address {
        Address([b; 20])
    }

    fn ops(ledger: &Arc<MockLedger>) -> ParticipantOps {
        ParticipantOps::new(ledger.clone(), &EngineConfig::development())
    }

    #[tokio::test]
    async fn test_register_approves_then_registers() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_balance(addr(1), 50 * ONE_TOKEN);

        let outcome = ops(&ledger).register(&addr(1), &addr(2), None).await.unwrap();
        assert!(outcome.approve_tx.is_some());
        assert!(outcome.profile.is_none());

        let amount = EngineConfig::development().registration_approve_amount;
        assert_eq!(
            ledger.writes(),
            vec![
                WriteCall::Approve { owner: addr(1), amount },
                WriteCall::Register { user: addr(1), referrer: addr(2) },
            ]
        );
        assert_eq!(ledger.level_of(&addr(1)), 1);
        assert_eq!(ledger.allowance_of(&addr(1)), amount - REGISTRATION_COST);
        assert_eq!(
            ledger.reads(),
            vec!["getUserStats", "balanceOf", "allowance"]
        );
    }

    #[tokio::test]
    async fn test_register_skips_approve_when_allowed() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_balance(addr(1), 50 * ONE_TOKEN);
        ledger.set_allowance(addr(1), REGISTRATION_COST);

        let outcome = ops(&ledger).register(&addr(1), &addr(2), None).await.unwrap();
        assert!(outcome.approve_tx.is_none());
        assert_eq!(ledger.write_count(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_balance_submits_nothing() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_balance(addr(1), 10 * ONE_TOKEN);

        let err = ops(&ledger)
            .register(&addr(1), &addr(2), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert!(err.to_string().contains("need 11.00, have 10.00"));
        assert_eq!(ledger.write_count(), 0);
    }

    #[tokio::test]
    async fn test_reverted_approve_stops_registration() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_balance(addr(1), 50 * ONE_TOKEN);
        ledger.revert_write("approve");

        let err = ops(&ledger)
            .register(&addr(1), &addr(2), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ReceiptFailed { .. }));
        assert_eq!(ledger.write_count(), 1);
    }

    #[tokio::test]
    async fn test_rejected_register_is_classified() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_balance(addr(1), 50 * ONE_TOKEN);
        ledger.set_allowance(addr(1), REGISTRATION_COST);
        ledger.fail_write("register", "execution reverted: custom error 0xfb8f41b2");

        let err = ops(&ledger)
            .register(&addr(1), &addr(2), None)
            .await
            .unwrap_err();
        assert_eq!(err.failure_cause(), Some(FailureCause::InsufficientAllowance));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_level(addr(1), 2);
        let ops = ops(&ledger);

        assert!(matches!(
            ops.register(&addr(1), &addr(2), None).await,
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            ops.register(&addr(3), &addr(3), None).await,
            Err(EngineError::Validation(_))
        ));
        assert_eq!(ledger.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_syncs_backend_profile() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_balance(addr(1), 50 * ONE_TOKEN);
        let profiles = Arc::new(MemoryProfileService::with_lag(1));

        let outcome = ops(&ledger)
            .with_profiles(profiles.clone())
            .register(&addr(1), &addr(2), Some("TW00007"))
            .await
            .unwrap();

        assert_eq!(outcome.profile.unwrap().userid, "TW00001");
        assert_eq!(
            profiles.registrations(),
            vec![(addr(1), Some("TW00007".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_upgrade() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_level(addr(1), 1);
        ledger.set_balance(addr(1), 100 * ONE_TOKEN);

        let outcome = ops(&ledger).upgrade(&addr(1), 2).await.unwrap();
        assert_eq!(outcome.level, 2);
        assert_eq!(
            ledger.writes(),
            vec![
                WriteCall::Approve { owner: addr(1), amount: 22 * ONE_TOKEN },
                WriteCall::Upgrade { user: addr(1), level: 2 },
            ]
        );
        assert_eq!(ledger.level_of(&addr(1)), 2);
    }

    #[tokio::test]
    async fn test_upgrade_validation() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_level(addr(1), 3);
        ledger.set_balance(addr(1), 10_000 * ONE_TOKEN);
        let ops = ops(&ledger);

        for level in [0, 1, 3, 11] {
            assert!(matches!(
                ops.upgrade(&addr(1), level).await,
                Err(EngineError::Validation(_))
            ));
        }
        assert!(matches!(
            ops.upgrade(&addr(9), 2).await,
            Err(EngineError::Validation(_))
        ));
        assert_eq!(ledger.write_count(), 0);
    }
}
