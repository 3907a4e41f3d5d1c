//! In-memory cooldown store

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::{cooldown_elapsed, CooldownStore};
use crate::error::EngineResult;

/// Thread-safe in-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryCooldownStore {
    attempts: Arc<RwLock<HashMap<usize, u64>>>,
}

impl MemoryCooldownStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CooldownStore for MemoryCooldownStore {
    async fn last_attempt(&self, tier: usize) -> EngineResult<Option<u64>> {
        Ok(self.attempts.read().await.get(&tier).copied())
    }

    async fn record_attempt(&self, tier: usize, at_ms: u64) -> EngineResult<()> {
        self.attempts.write().await.insert(tier, at_ms);
        Ok(())
    }

    async fn clear(&self, tier: usize) -> EngineResult<()> {
        self.attempts.write().await.remove(&tier);
        Ok(())
    }

    async fn try_claim(&self, tier: usize, now_ms: u64, cooldown: Duration) -> EngineResult<bool> {
        let mut attempts = self.attempts.write().await;
        if !cooldown_elapsed(attempts.get(&tier).copied(), now_ms, cooldown) {
            return Ok(false);
        }
        attempts.insert(tier, now_ms);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_claim_respects_cooldown() {
        let store = MemoryCooldownStore::new();
        let cooldown = Duration::from_secs(60);

        assert!(store.try_claim(0, 1_000, cooldown).await.unwrap());
        assert_eq!(store.last_attempt(0).await.unwrap(), Some(1_000));
        assert!(!store.try_claim(0, 30_000, cooldown).await.unwrap());
        assert_eq!(store.last_attempt(0).await.unwrap(), Some(1_000));

        // other tiers are independent
        assert!(store.try_claim(1, 30_000, cooldown).await.unwrap());
        assert!(store.try_claim(0, 61_001, cooldown).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_claims_grant_one() {
        let store = MemoryCooldownStore::new();
        let cooldown = Duration::from_secs(60);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.try_claim(2, 5_000, cooldown).await.unwrap() })
            })
            .collect();

        let mut granted = 0;
        for h in handles {
            if h.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = MemoryCooldownStore::new();
        store.record_attempt(3, 10).await.unwrap();
        store.clear(3).await.unwrap();
        assert_eq!(store.last_attempt(3).await.unwrap(), None);
    }
}
