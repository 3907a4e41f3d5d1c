//! Cooldown storage
//!
//! The registration scheduler keeps one "last attempt" timestamp per tier.
//! It is the only client-local mutable state, so the check and the write
//! happen in one step ([`CooldownStore::try_claim`]).
//!
//! - [`MemoryCooldownStore`]: process-local, for tests and one-shot runs
//! - [`SledCooldownStore`]: survives restarts

pub mod memory;
pub mod sled;

pub use self::memory::MemoryCooldownStore;
pub use self::sled::SledCooldownStore;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::EngineResult;

/// Per-tier registration attempt timestamps, unix milliseconds
#[async_trait]
pub trait CooldownStore: Send + Sync {
    async fn last_attempt(&self, tier: usize) -> EngineResult<Option<u64>>;

    async fn record_attempt(&self, tier: usize, at_ms: u64) -> EngineResult<()>;

    async fn clear(&self, tier: usize) -> EngineResult<()>;

    /// Record `now_ms` and return `true` if the cooldown has elapsed
    ///
    /// Returns `false` without writing when it has not. Implementations
    /// must make the read and the write atomic.
    async fn try_claim(&self, tier: usize, now_ms: u64, cooldown: Duration) -> EngineResult<bool>;
}

/// Whether more than `cooldown` has passed since `last`
///
/// A timestamp in the future (clock moved back) counts as not elapsed.
pub fn cooldown_elapsed(last: Option<u64>, now_ms: u64, cooldown: Duration) -> bool {
    match last {
        None => true,
        Some(last) => u128::from(now_ms.saturating_sub(last)) > cooldown.as_millis(),
    }
}
