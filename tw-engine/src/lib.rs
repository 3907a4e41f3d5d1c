//! TetherWave Engine - async client for the referral matrix ledger
//!
//! This crate connects the pure domain logic of `tw-core` to the outside
//! world: the ledger, the operator signing service and the profile backend.
//!
//! # Architecture
//!
//! - **Ledger**: [`Ledger`] trait, JSON-RPC gateway client and in-memory mock
//! - **Resolver**: sponsors and downline pages ([`MatrixPositionResolver`])
//! - **Income**: paged, filtered income history ([`IncomeEventAggregator`])
//! - **Royalty**: tier snapshots with sticky achievement ([`RoyaltyTracker`])
//! - **Schedulers**: automatic tier registration and royalty distribution
//! - **Ops**: participant registration and upgrades ([`ParticipantOps`])
//! - **Signer**: privileged writes through a signing service
//! - **Backend**: profile ids and referral codes
//! - **Storage**: per-tier registration cooldowns (memory or sled)
//! - **View**: liveness guards for display fetches
//! - **Dashboard**: a participant's display panels, loaded under one view scope
//!
//! # Failure policy
//!
//! Display reads degrade to empty values and never return errors. Writes
//! always propagate their errors. Schedulers log and drop their own failures.
//!
//! # Usage
//!
//! ```rust,no_run
//! use tw_engine::{EngineConfig, TwClient};
//!
//! async fn example() {
//!     let client = TwClient::new(EngineConfig::from_env()).unwrap();
//!     let user = "0x00000000000000000000000000000000000000aa".parse().unwrap();
//!
//!     let snapshot = client.royalty(&user).await;
//!     for tier in &snapshot.tiers {
//!         println!("{}: {:?}", tier.name, tier.status);
//!     }
//! }
//! ```

pub mod backend;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod income;
pub mod ledger;
pub mod ops;
pub mod resolver;
pub mod retry;
pub mod royalty;
pub mod scheduler;
pub mod signer;
pub mod storage;
pub mod view;

pub use backend::{BackendClient, MemoryProfileService, ProfileService, ReferralInfo, UserProfile};
pub use config::{
    BackendConfig, CooldownPolicy, EngineConfig, IncomeStrategy, LedgerRpcConfig, SignerConfig,
};
pub use dashboard::{Dashboard, DashboardView};
pub use error::{EngineError, EngineResult};
pub use income::IncomeEventAggregator;
pub use ledger::{Ledger, MockLedger, ReceiptStatus, RpcLedger, TxHash, TxReceipt, WriteCall};
pub use ops::{ParticipantOps, RegistrationOutcome, UpgradeOutcome};
pub use resolver::MatrixPositionResolver;
pub use retry::RetryStrategy;
pub use royalty::{RoyaltySnapshot, RoyaltyTracker};
pub use scheduler::{
    DistributionReport, DistributionScheduler, DistributionTargets, RegistrationReport,
    RegistrationScheduler, SchedulerHandle,
};
pub use signer::{PrivilegedGateway, SigningServiceClient};
pub use storage::{CooldownStore, MemoryCooldownStore, SledCooldownStore};
pub use view::{LiveToken, ViewCell, ViewScope};

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use tw_core::{
    Address, DownlinePage, IncomePage, IncomeSummary, IncomeType, Participant, RankIncome,
    ReferralPage, Sponsors,
};

/// TetherWave client
///
/// Owns the collaborators and the components built on them.
pub struct TwClient {
    config: EngineConfig,
    ledger: Arc<dyn Ledger>,
    gateway: Arc<dyn PrivilegedGateway>,
    profiles: Arc<dyn ProfileService>,
    /// Persistent cooldowns, `None` keeps them in memory
    cooldown_db: Option<SledCooldownStore>,
    resolver: MatrixPositionResolver,
    income: IncomeEventAggregator,
    tracker: Arc<RoyaltyTracker>,
    ops: ParticipantOps,
}

impl TwClient {
    /// Connect to the configured gateway, signing service and backend
    ///
    /// Nothing is contacted here. A missing signer token only fails the
    /// privileged writes that need it.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        info!(ledger = %config.ledger.url, backend = %config.backend.url, "Initializing TetherWave client");

        let ledger: Arc<dyn Ledger> = Arc::new(RpcLedger::new(config.ledger.clone())?);
        if config.signer.token.is_none() {
            warn!("TW_SIGNER_TOKEN not set, privileged writes will fail");
        }
        let gateway: Arc<dyn PrivilegedGateway> =
            Arc::new(SigningServiceClient::new(config.signer.clone())?);
        let profiles: Arc<dyn ProfileService> = Arc::new(BackendClient::new(&config.backend)?);

        let cooldown_db = match &config.cooldown_db {
            Some(path) => {
                info!(path = %path.display(), "Opening cooldown store");
                Some(SledCooldownStore::open(path)?)
            }
            None => None,
        };

        let mut client = Self::with_parts(config, ledger, gateway, profiles);
        client.cooldown_db = cooldown_db;
        Ok(client)
    }

    /// Build from explicit collaborators; cooldowns stay in memory
    pub fn with_parts(
        config: EngineConfig,
        ledger: Arc<dyn Ledger>,
        gateway: Arc<dyn PrivilegedGateway>,
        profiles: Arc<dyn ProfileService>,
    ) -> Self {
        let resolver = MatrixPositionResolver::new(ledger.clone());
        let income = IncomeEventAggregator::new(
            ledger.clone(),
            config.income_strategy,
            config.ledger.supports_income_filter,
        );
        let tracker = Arc::new(RoyaltyTracker::new(ledger.clone(), config.tiers.clone()));
        let ops = ParticipantOps::new(ledger.clone(), &config).with_profiles(profiles.clone());

        Self {
            config,
            ledger,
            gateway,
            profiles,
            cooldown_db: None,
            resolver,
            income,
            tracker,
            ops,
        }
    }

    // ==================== Reads ====================

    pub async fn sponsors(&self, address: &Address) -> EngineResult<Sponsors> {
        self.resolver.get_sponsors(address).await
    }

    pub async fn participant(&self, address: &Address) -> EngineResult<Participant> {
        self.resolver.get_participant(address).await
    }

    pub async fn downline(
        &self,
        address: &Address,
        depth: u32,
        start_index: u64,
        limit: u64,
    ) -> DownlinePage {
        self.resolver
            .get_downline_by_depth(address, depth, start_index, limit)
            .await
    }

    pub async fn income_page(
        &self,
        address: &Address,
        page: u64,
        items_per_page: u64,
        filter: &[IncomeType],
    ) -> IncomePage {
        self.income
            .fetch_page(address, page, items_per_page, filter)
            .await
    }

    pub async fn income_summary(&self, address: &Address) -> Option<IncomeSummary> {
        self.income.summary(address).await
    }

    pub async fn referrals(&self, address: &Address, page: u64, items_per_page: u64) -> ReferralPage {
        self.resolver
            .get_direct_referrals(address, page, items_per_page)
            .await
    }

    pub async fn referral_code(&self, address: &Address) -> Option<String> {
        self.resolver.get_referral_code(address).await
    }

    pub async fn rank_income(&self, address: &Address) -> Option<RankIncome> {
        self.income.rank_income(address).await
    }

    pub async fn royalty(&self, address: &Address) -> RoyaltySnapshot {
        self.tracker.refresh(address).await
    }

    /// Backend display ids, empty when the backend is unreachable
    pub async fn display_ids(&self, addresses: &[Address]) -> HashMap<Address, String> {
        match self.profiles.bulk_lookup(addresses).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(count = addresses.len(), error = %e, "Display id lookup failed");
                HashMap::new()
            }
        }
    }

    /// Resolve a referral code to the referrer's wallet
    pub async fn referrer_for_code(&self, code: &str) -> EngineResult<Address> {
        Ok(self.profiles.referral_info(code).await?.referring_wallet)
    }

    // ==================== Writes ====================

    pub async fn register(
        &self,
        user: &Address,
        referrer: &Address,
        referral_id: Option<&str>,
    ) -> EngineResult<RegistrationOutcome> {
        self.ops.register(user, referrer, referral_id).await
    }

    pub async fn upgrade(&self, user: &Address, level: u8) -> EngineResult<UpgradeOutcome> {
        self.ops.upgrade(user, level).await
    }

    // ==================== Schedulers ====================

    /// Cooldown store for one participant's registrations
    pub fn cooldown_store_for(&self, participant: &Address) -> EngineResult<Arc<dyn CooldownStore>> {
        Ok(match &self.cooldown_db {
            Some(db) => Arc::new(db.namespace(&participant.to_hex())?),
            None => Arc::new(MemoryCooldownStore::new()),
        })
    }

    pub fn registration_scheduler(
        &self,
        participant: &Address,
    ) -> EngineResult<Arc<RegistrationScheduler>> {
        let cooldown = self.config.registration_cooldown.duration();
        info!(address = %participant, cooldown_secs = cooldown.as_secs(), "Creating registration scheduler");
        Ok(Arc::new(RegistrationScheduler::new(
            self.tracker.clone(),
            self.gateway.clone(),
            self.ledger.clone(),
            self.cooldown_store_for(participant)?,
            *participant,
            cooldown,
        )))
    }

    pub fn distribution_scheduler(&self, targets: DistributionTargets) -> Arc<DistributionScheduler> {
        Arc::new(DistributionScheduler::new(
            self.ledger.clone(),
            self.gateway.clone(),
            self.tracker.clone(),
            targets,
        ))
    }

    /// Start both schedulers for `participant` at the configured poll interval
    pub fn start_schedulers(
        &self,
        participant: &Address,
    ) -> EngineResult<(SchedulerHandle, SchedulerHandle)> {
        let period = self.config.poll_interval();
        let registration = self.registration_scheduler(participant)?.start(period);
        let distribution = self
            .distribution_scheduler(DistributionTargets::Participant(*participant))
            .start(period);
        Ok((registration, distribution))
    }

    // ==================== Accessors ====================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub fn gateway(&self) -> &Arc<dyn PrivilegedGateway> {
        &self.gateway
    }

    pub fn profiles(&self) -> &Arc<dyn ProfileService> {
        &self.profiles
    }

    pub fn tracker(&self) -> &Arc<RoyaltyTracker> {
        &self.tracker
    }
}

/// Create a client with the development configuration
pub fn create_development_client() -> EngineResult<TwClient> {
    TwClient::new(EngineConfig::development())
}
