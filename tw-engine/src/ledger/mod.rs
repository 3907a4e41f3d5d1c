//! Ledger access
//!
//! The ledger is the authoritative chain-side state: balances, matrix
//! positions, activation counts, royalty records and the income event log.
//! Everything the engine knows about a participant comes through the
//! [`Ledger`] trait.
//!
//! # Implementations
//!
//! - [`RpcLedger`]: JSON-RPC gateway client, one method per contract function
//! - [`MockLedger`]: in-memory ledger that records every write, for tests and
//!   local development
//!
//! Reads return the named-field records from `tw-core`; the positional tuples
//! the contract returns are converted in [`tuple`].

pub mod mock;
pub mod rpc;
pub mod tuple;

pub use mock::{MockLedger, WriteCall};
pub use rpc::RpcLedger;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use tw_core::{
    Address, DownlinePage, IncomePage, IncomeSummary, IncomeType, LevelIncome, ReferralPage,
    RoyaltyInfo, Sponsors, MATRIX_WIDTH,
};

use crate::error::{EngineError, EngineResult};

/// Handle of a submitted transaction
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    pub fn from_hex(s: &str) -> EngineResult<Self> {
        let stripped = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes = hex::decode(stripped)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| EngineError::Decode(format!("transaction hash must be 32 bytes: {}", s)))?;
        Ok(Self(arr))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self.to_hex())
    }
}

impl FromStr for TxHash {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for TxHash {
    type Error = EngineError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<TxHash> for String {
    fn from(h: TxHash) -> Self {
        h.to_hex()
    }
}

/// Final status of a mined transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Receipt of a mined transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub status: ReceiptStatus,
    pub block_number: Option<u64>,
}

impl TxReceipt {
    pub fn is_success(&self) -> bool {
        self.status == ReceiptStatus::Success
    }

    /// Turn a reverted receipt into [`EngineError::ReceiptFailed`]
    pub fn ensure_success(self) -> EngineResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(EngineError::ReceiptFailed {
                tx_hash: self.tx_hash.to_hex(),
            })
        }
    }
}

/// Chain-side state of the referral matrix
///
/// Reads map one-to-one onto contract view functions. Writes are signed by
/// the participant's own wallet behind the gateway and return a handle that
/// must be passed to [`Ledger::wait_for_receipt`] before the write counts as
/// done. Privileged writes are not here; see
/// [`PrivilegedGateway`](crate::signer::PrivilegedGateway).
#[async_trait]
pub trait Ledger: Send + Sync {
    // ==================== Participant ====================

    /// Current matrix level, 0 when unregistered (`getUserStats`)
    async fn current_level(&self, user: &Address) -> EngineResult<u8>;

    /// Direct and matrix sponsor (`getMatrixPosition`)
    async fn matrix_position(&self, user: &Address) -> EngineResult<Sponsors>;

    /// Aggregated income figures (`getUserCompleteStats`)
    async fn complete_stats(&self, user: &Address) -> EngineResult<IncomeSummary>;

    /// Paginated downline at `depth` (`getDownlineByDepthPaginated`)
    async fn downline_by_depth(
        &self,
        user: &Address,
        depth: u32,
        start: u64,
        limit: u64,
    ) -> EngineResult<DownlinePage>;

    /// Paginated list of direct referrals (`getDirectReferralDataPaginated`)
    async fn direct_referrals(
        &self,
        user: &Address,
        start: u64,
        limit: u64,
    ) -> EngineResult<ReferralPage>;

    /// Income per team level (`getUserTeamStats`)
    async fn team_level_incomes(&self, user: &Address) -> EngineResult<Vec<LevelIncome>>;

    /// Direct referral commission earned so far (`getUserStats`, field 3)
    async fn direct_commission(&self, user: &Address) -> EngineResult<u128>;

    /// The participant's on-chain referral code (`getReferralCode`)
    async fn referral_code(&self, user: &Address) -> EngineResult<String>;

    /// Income events (`getRecentIncomeEventsPaginated`)
    ///
    /// An empty `filter` means every income type.
    async fn recent_income_events(
        &self,
        user: &Address,
        start: u64,
        limit: u64,
        filter: &[IncomeType],
    ) -> EngineResult<IncomePage>;

    // ==================== Royalty ====================

    /// Raw per-tier qualification flags (`checkQualification`)
    async fn check_qualification(&self, user: &Address) -> EngineResult<Vec<bool>>;

    /// Per-tier royalty record (`getUserRoyaltyInfo`)
    async fn user_royalty_info(&self, user: &Address) -> EngineResult<RoyaltyInfo>;

    /// Achievers per tier (`getTierAchieversCount`)
    async fn tier_achievers_count(&self) -> EngineResult<Vec<u64>>;

    /// Activations per branch at `depth` (`getLevelActivatedCount`)
    async fn level_activated_count(
        &self,
        user: &Address,
        depth: u32,
    ) -> EngineResult<[u64; MATRIX_WIDTH]>;

    /// Unix seconds before which tier `tier` cannot distribute (`getNextDistributionTime`)
    async fn next_distribution_time(&self, tier: usize) -> EngineResult<u64>;

    // ==================== Settlement token ====================

    async fn token_balance(&self, owner: &Address) -> EngineResult<u128>;

    /// Allowance granted by `owner` to the matrix contract
    async fn token_allowance(&self, owner: &Address) -> EngineResult<u128>;

    // ==================== Writes ====================

    /// Approve the matrix contract to spend `amount` of `owner`'s tokens
    async fn approve(&self, owner: &Address, amount: u128) -> EngineResult<TxHash>;

    async fn register(&self, user: &Address, referrer: &Address) -> EngineResult<TxHash>;

    async fn upgrade(&self, user: &Address, level: u8) -> EngineResult<TxHash>;

    /// Wait until the transaction is mined
    ///
    /// A reverted transaction is returned as a receipt, not an error.
    async fn wait_for_receipt(&self, tx: &TxHash) -> EngineResult<TxReceipt>;
}
