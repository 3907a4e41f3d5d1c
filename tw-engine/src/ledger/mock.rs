//! In-memory ledger
//!
//! Holds just enough chain state to drive the engine without a node: levels,
//! sponsors, downlines, the income log, royalty records and token balances.
//! Every write is recorded so callers can assert on what was submitted.
//! Reads and writes can be made to fail per contract function.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tw_core::{
    level_cost, Address, DirectReferral, DownlineEntry, DownlinePage, IncomeEvent, IncomePage,
    IncomeSummary, IncomeType, LevelIncome, ReferralPage, RoyaltyInfo, Sponsors, MATRIX_WIDTH,
    REGISTRATION_LEVEL,
};

use super::{Ledger, ReceiptStatus, TxHash, TxReceipt};
use crate::error::{EngineError, EngineResult};
use crate::signer::PrivilegedGateway;

/// A write submitted to the mock ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCall {
    Approve { owner: Address, amount: u128 },
    Register { user: Address, referrer: Address },
    Upgrade { user: Address, level: u8 },
    RegisterQualifiedTiers { user: Address },
    DistributeTierRoyalties { tier: usize },
}

#[derive(Default)]
struct MockState {
    levels: HashMap<Address, u8>,
    sponsors: HashMap<Address, Sponsors>,
    stats: HashMap<Address, IncomeSummary>,
    downlines: HashMap<(Address, u32), Vec<DownlineEntry>>,
    income: HashMap<Address, Vec<IncomeEvent>>,
    referrals: HashMap<Address, Vec<DirectReferral>>,
    team_incomes: HashMap<Address, Vec<LevelIncome>>,
    commissions: HashMap<Address, u128>,
    referral_codes: HashMap<Address, String>,
    qualification: HashMap<Address, Vec<bool>>,
    royalty: HashMap<Address, RoyaltyInfo>,
    activations: HashMap<(Address, u32), [u64; MATRIX_WIDTH]>,
    achievers: Vec<u64>,
    next_distribution: HashMap<usize, u64>,
    balances: HashMap<Address, u128>,
    allowances: HashMap<Address, u128>,

    writes: Vec<WriteCall>,
    reads: Vec<&'static str>,
    receipts: HashMap<TxHash, ReceiptStatus>,
    tx_counter: u64,

    failing_reads: HashSet<&'static str>,
    failing_writes: HashMap<&'static str, String>,
    reverting_writes: HashSet<&'static str>,
    ignores_income_filter: bool,
}

/// In-memory [`Ledger`] and [`PrivilegedGateway`]
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== Setup ====================

    pub fn set_level(&self, user: Address, level: u8) {
        self.state().levels.insert(user, level);
    }

    pub fn set_sponsors(&self, user: Address, sponsors: Sponsors) {
        self.state().sponsors.insert(user, sponsors);
    }

    pub fn set_stats(&self, user: Address, stats: IncomeSummary) {
        self.state().stats.insert(user, stats);
    }

    pub fn set_downline(&self, user: Address, depth: u32, entries: Vec<DownlineEntry>) {
        self.state().downlines.insert((user, depth), entries);
    }

    /// Append events to the participant's log, oldest first
    pub fn push_income(&self, user: Address, events: impl IntoIterator<Item = IncomeEvent>) {
        self.state().income.entry(user).or_default().extend(events);
    }

    pub fn set_direct_referrals(&self, user: Address, referrals: Vec<DirectReferral>) {
        self.state().referrals.insert(user, referrals);
    }

    pub fn set_team_incomes(&self, user: Address, incomes: Vec<LevelIncome>) {
        self.state().team_incomes.insert(user, incomes);
    }

    pub fn set_direct_commission(&self, user: Address, amount: u128) {
        self.state().commissions.insert(user, amount);
    }

    pub fn set_referral_code(&self, user: Address, code: impl Into<String>) {
        self.state().referral_codes.insert(user, code.into());
    }

    pub fn set_qualification(&self, user: Address, flags: Vec<bool>) {
        self.state().qualification.insert(user, flags);
    }

    pub fn set_royalty_info(&self, user: Address, info: RoyaltyInfo) {
        self.state().royalty.insert(user, info);
    }

    pub fn set_activations(&self, user: Address, depth: u32, counts: [u64; MATRIX_WIDTH]) {
        self.state().activations.insert((user, depth), counts);
    }

    pub fn set_achievers(&self, counts: Vec<u64>) {
        self.state().achievers = counts;
    }

    pub fn set_next_distribution_time(&self, tier: usize, at: u64) {
        self.state().next_distribution.insert(tier, at);
    }

    pub fn set_balance(&self, owner: Address, amount: u128) {
        self.state().balances.insert(owner, amount);
    }

    pub fn set_allowance(&self, owner: Address, amount: u128) {
        self.state().allowances.insert(owner, amount);
    }

    /// Make a read fail with a transient error
    pub fn fail_read(&self, method: &'static str) {
        self.state().failing_reads.insert(method);
    }

    /// Make a write be rejected with `raw` as the revert text
    pub fn fail_write(&self, method: &'static str, raw: impl Into<String>) {
        self.state().failing_writes.insert(method, raw.into());
    }

    /// Make a write be accepted but mined with a reverted status
    pub fn revert_write(&self, method: &'static str) {
        self.state().reverting_writes.insert(method);
    }

    /// Return the whole log regardless of the filter argument
    pub fn ignore_income_filter(&self) {
        self.state().ignores_income_filter = true;
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.failing_reads.clear();
        state.failing_writes.clear();
        state.reverting_writes.clear();
    }

    // ==================== Inspection ====================

    pub fn writes(&self) -> Vec<WriteCall> {
        self.state().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.state().writes.len()
    }

    /// Contract functions read so far, in call order
    pub fn reads(&self) -> Vec<&'static str> {
        self.state().reads.clone()
    }

    pub fn allowance_of(&self, owner: &Address) -> u128 {
        self.state().allowances.get(owner).copied().unwrap_or(0)
    }

    pub fn level_of(&self, user: &Address) -> u8 {
        self.state().levels.get(user).copied().unwrap_or(0)
    }

    // ==================== Internals ====================

    fn begin_read(&self, method: &'static str) -> EngineResult<MutexGuard<'_, MockState>> {
        let mut state = self.state();
        state.reads.push(method);
        if state.failing_reads.contains(method) {
            return Err(EngineError::Read(format!("{}: connection refused", method)));
        }
        Ok(state)
    }

    /// Record a write, then apply `effect` unless the write fails or reverts
    fn submit(
        &self,
        method: &'static str,
        call: WriteCall,
        effect: impl FnOnce(&mut MockState),
    ) -> EngineResult<TxHash> {
        let mut state = self.state();
        state.writes.push(call);

        if let Some(raw) = state.failing_writes.get(method) {
            return Err(EngineError::write(raw));
        }

        state.tx_counter += 1;
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&state.tx_counter.to_be_bytes());
        let tx = TxHash(bytes);

        let status = if state.reverting_writes.contains(method) {
            ReceiptStatus::Reverted
        } else {
            effect(&mut state);
            ReceiptStatus::Success
        };
        state.receipts.insert(tx, status);
        Ok(tx)
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn current_level(&self, user: &Address) -> EngineResult<u8> {
        let state = self.begin_read("getUserStats")?;
        Ok(state.levels.get(user).copied().unwrap_or(0))
    }

    async fn matrix_position(&self, user: &Address) -> EngineResult<Sponsors> {
        let state = self.begin_read("getMatrixPosition")?;
        Ok(state.sponsors.get(user).copied().unwrap_or(Sponsors {
            direct_sponsor: Address::ZERO,
            matrix_sponsor: Address::ZERO,
        }))
    }

    async fn complete_stats(&self, user: &Address) -> EngineResult<IncomeSummary> {
        let state = self.begin_read("getUserCompleteStats")?;
        Ok(state.stats.get(user).cloned().unwrap_or_default())
    }

    async fn downline_by_depth(
        &self,
        user: &Address,
        depth: u32,
        start: u64,
        limit: u64,
    ) -> EngineResult<DownlinePage> {
        let state = self.begin_read("getDownlineByDepthPaginated")?;
        let all = state
            .downlines
            .get(&(*user, depth))
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        Ok(DownlinePage {
            entries: window(all, start, limit).to_vec(),
            total_count: all.len() as u64,
        })
    }

    async fn direct_referrals(
        &self,
        user: &Address,
        start: u64,
        limit: u64,
    ) -> EngineResult<ReferralPage> {
        let state = self.begin_read("getDirectReferralDataPaginated")?;
        let all = state.referrals.get(user).map(|v| v.as_slice()).unwrap_or(&[]);
        Ok(ReferralPage {
            entries: window(all, start, limit).to_vec(),
            total_count: all.len() as u64,
        })
    }

    async fn team_level_incomes(&self, user: &Address) -> EngineResult<Vec<LevelIncome>> {
        let state = self.begin_read("getUserTeamStats")?;
        Ok(state.team_incomes.get(user).cloned().unwrap_or_default())
    }

    async fn direct_commission(&self, user: &Address) -> EngineResult<u128> {
        let state = self.begin_read("getUserStats")?;
        Ok(state.commissions.get(user).copied().unwrap_or(0))
    }

    async fn referral_code(&self, user: &Address) -> EngineResult<String> {
        let state = self.begin_read("getReferralCode")?;
        Ok(state.referral_codes.get(user).cloned().unwrap_or_default())
    }

    async fn recent_income_events(
        &self,
        user: &Address,
        start: u64,
        limit: u64,
        filter: &[IncomeType],
    ) -> EngineResult<IncomePage> {
        let state = self.begin_read("getRecentIncomeEventsPaginated")?;
        let log = state.income.get(user).map(|v| v.as_slice()).unwrap_or(&[]);
        let matching: Vec<IncomeEvent> = if filter.is_empty() || state.ignores_income_filter {
            log.to_vec()
        } else {
            log.iter()
                .filter(|e| filter.contains(&e.income_type))
                .cloned()
                .collect()
        };
        Ok(IncomePage {
            events: window(&matching, start, limit).to_vec(),
            total_count: matching.len() as u64,
        })
    }

    async fn check_qualification(&self, user: &Address) -> EngineResult<Vec<bool>> {
        let state = self.begin_read("checkQualification")?;
        Ok(state.qualification.get(user).cloned().unwrap_or_default())
    }

    async fn user_royalty_info(&self, user: &Address) -> EngineResult<RoyaltyInfo> {
        let state = self.begin_read("getUserRoyaltyInfo")?;
        Ok(state.royalty.get(user).cloned().unwrap_or_default())
    }

    async fn tier_achievers_count(&self) -> EngineResult<Vec<u64>> {
        let state = self.begin_read("getTierAchieversCount")?;
        Ok(state.achievers.clone())
    }

    async fn level_activated_count(
        &self,
        user: &Address,
        depth: u32,
    ) -> EngineResult<[u64; MATRIX_WIDTH]> {
        let state = self.begin_read("getLevelActivatedCount")?;
        Ok(state
            .activations
            .get(&(*user, depth))
            .copied()
            .unwrap_or([0; MATRIX_WIDTH]))
    }

    async fn next_distribution_time(&self, tier: usize) -> EngineResult<u64> {
        let state = self.begin_read("getNextDistributionTime")?;
        Ok(state.next_distribution.get(&tier).copied().unwrap_or(0))
    }

    async fn token_balance(&self, owner: &Address) -> EngineResult<u128> {
        let state = self.begin_read("balanceOf")?;
        Ok(state.balances.get(owner).copied().unwrap_or(0))
    }

    async fn token_allowance(&self, owner: &Address) -> EngineResult<u128> {
        let state = self.begin_read("allowance")?;
        Ok(state.allowances.get(owner).copied().unwrap_or(0))
    }

    async fn approve(&self, owner: &Address, amount: u128) -> EngineResult<TxHash> {
        let owner = *owner;
        self.submit("approve", WriteCall::Approve { owner, amount }, |s| {
            s.allowances.insert(owner, amount);
        })
    }

    async fn register(&self, user: &Address, referrer: &Address) -> EngineResult<TxHash> {
        let (user, referrer) = (*user, *referrer);
        self.submit("register", WriteCall::Register { user, referrer }, |s| {
            s.levels.insert(user, REGISTRATION_LEVEL);
            s.sponsors.entry(user).or_insert(Sponsors {
                direct_sponsor: referrer,
                matrix_sponsor: referrer,
            });
            s.referrals.entry(referrer).or_default().push(DirectReferral {
                address: user,
                activation_time: 0,
                current_level: REGISTRATION_LEVEL,
                direct_referrals: 0,
            });
            charge(s, user, REGISTRATION_LEVEL);
        })
    }

    async fn upgrade(&self, user: &Address, level: u8) -> EngineResult<TxHash> {
        let user = *user;
        self.submit("upgrade", WriteCall::Upgrade { user, level }, |s| {
            s.levels.insert(user, level);
            charge(s, user, level);
        })
    }

    async fn wait_for_receipt(&self, tx: &TxHash) -> EngineResult<TxReceipt> {
        let state = self.state();
        let status = state
            .receipts
            .get(tx)
            .copied()
            .ok_or_else(|| EngineError::Network(format!("unknown transaction {}", tx)))?;
        Ok(TxReceipt {
            tx_hash: *tx,
            status,
            block_number: Some(state.tx_counter),
        })
    }
}

#[async_trait]
impl PrivilegedGateway for MockLedger {
    async fn register_qualified_tiers(&self, user: &Address) -> EngineResult<TxHash> {
        let user = *user;
        self.submit(
            "registerQualifiedTiers",
            WriteCall::RegisterQualifiedTiers { user },
            |_| {},
        )
    }

    async fn distribute_tier_royalties(&self, tier: usize) -> EngineResult<TxHash> {
        self.submit(
            "distributeTierRoyalties",
            WriteCall::DistributeTierRoyalties { tier },
            |_| {},
        )
    }
}

fn window<T>(items: &[T], start: u64, limit: u64) -> &[T] {
    let len = items.len();
    let start = usize::try_from(start).unwrap_or(len).min(len);
    let end = start.saturating_add(usize::try_from(limit).unwrap_or(len)).min(len);
    &items[start..end]
}

/// Spend the level cost from balance and allowance
fn charge(state: &mut MockState, user: Address, level: u8) {
    let cost = level_cost(level).unwrap_or(0);
    if let Some(b) = state.balances.get_mut(&user) {
        *b = b.saturating_sub(cost);
    }
    if let Some(a) = state.allowances.get_mut(&user) {
        *a = a.saturating_sub(cost);
    }
}
