//! Sled-backed cooldown store
//!
//! Timestamps are stored as 8-byte big-endian values under
//! `last_registration_attempt:<tier>`, one tree per namespace.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::{cooldown_elapsed, CooldownStore};
use crate::error::{EngineError, EngineResult};

const DEFAULT_TREE: &str = "cooldowns";
const KEY_PREFIX: &str = "last_registration_attempt:";

/// Persistent store
#[derive(Debug, Clone)]
pub struct SledCooldownStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledCooldownStore {
    /// Open or create the store at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        Self::open_namespace(path, DEFAULT_TREE)
    }

    /// Open with a separate tree, e.g. one per participant
    pub fn open_namespace<P: AsRef<Path>>(path: P, namespace: &str) -> EngineResult<Self> {
        let db = sled::open(path)
            .map_err(|e| EngineError::Storage(format!("Failed to open sled db: {}", e)))?;
        let tree = db
            .open_tree(namespace)
            .map_err(|e| EngineError::Storage(format!("Failed to open {} tree: {}", namespace, e)))?;
        Ok(Self { db, tree })
    }

    /// Another namespace in the same database
    pub fn namespace(&self, namespace: &str) -> EngineResult<Self> {
        let tree = self
            .db
            .open_tree(namespace)
            .map_err(|e| EngineError::Storage(format!("Failed to open {} tree: {}", namespace, e)))?;
        Ok(Self {
            db: self.db.clone(),
            tree,
        })
    }

    /// Flush to disk
    pub fn flush(&self) -> EngineResult<()> {
        self.db
            .flush()
            .map_err(|e| EngineError::Storage(format!("Failed to flush db: {}", e)))?;
        Ok(())
    }

    fn key(tier: usize) -> Vec<u8> {
        format!("{}{}", KEY_PREFIX, tier).into_bytes()
    }

    fn decode(bytes: &[u8]) -> EngineResult<u64> {
        let arr: [u8; 8] = bytes
            .try_into()
            .map_err(|_| EngineError::Storage(format!("corrupt timestamp of {} bytes", bytes.len())))?;
        Ok(u64::from_be_bytes(arr))
    }
}

#[async_trait]
impl CooldownStore for SledCooldownStore {
    async fn last_attempt(&self, tier: usize) -> EngineResult<Option<u64>> {
        let value = self
            .tree
            .get(Self::key(tier))
            .map_err(|e| EngineError::Storage(format!("Failed to read cooldown: {}", e)))?;
        value.map(|v| Self::decode(&v)).transpose()
    }

    async fn record_attempt(&self, tier: usize, at_ms: u64) -> EngineResult<()> {
        self.tree
            .insert(Self::key(tier), &at_ms.to_be_bytes()[..])
            .map_err(|e| EngineError::Storage(format!("Failed to write cooldown: {}", e)))?;
        self.tree.flush_async().await?;
        Ok(())
    }

    async fn clear(&self, tier: usize) -> EngineResult<()> {
        self.tree
            .remove(Self::key(tier))
            .map_err(|e| EngineError::Storage(format!("Failed to remove cooldown: {}", e)))?;
        Ok(())
    }

    async fn try_claim(&self, tier: usize, now_ms: u64, cooldown: Duration) -> EngineResult<bool> {
        let key = Self::key(tier);
        loop {
            let current = self
                .tree
                .get(&key)
                .map_err(|e| EngineError::Storage(format!("Failed to read cooldown: {}", e)))?;
            let last = current.as_ref().map(|v| Self::decode(v)).transpose()?;

            if !cooldown_elapsed(last, now_ms, cooldown) {
                return Ok(false);
            }

            let swapped = self
                .tree
                .compare_and_swap(&key, current, Some(&now_ms.to_be_bytes()[..]))
                .map_err(|e| EngineError::Storage(format!("Failed to write cooldown: {}", e)))?;

            match swapped {
                Ok(()) => {
                    self.tree.flush_async().await?;
                    return Ok(true);
                }
                Err(_) => debug!(tier, "Cooldown changed concurrently, re-reading"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_sled_claim_and_reopen() {
        let dir = tempdir().unwrap();
        let cooldown = Duration::from_secs(86_400);

        {
            let store = SledCooldownStore::open(dir.path()).unwrap();
            assert!(store.try_claim(1, 10_000, cooldown).await.unwrap());
            assert!(!store.try_claim(1, 20_000, cooldown).await.unwrap());
            store.flush().unwrap();
        }

        let store = SledCooldownStore::open(dir.path()).unwrap();
        assert_eq!(store.last_attempt(1).await.unwrap(), Some(10_000));
        assert_eq!(store.last_attempt(0).await.unwrap(), None);
        assert!(!store.try_claim(1, 86_410_000, cooldown).await.unwrap());
        assert!(store.try_claim(1, 86_410_001, cooldown).await.unwrap());
    }

    #[tokio::test]
    async fn test_sled_namespaces_are_separate() {
        let dir = tempdir().unwrap();
        let a = SledCooldownStore::open_namespace(dir.path(), "a").unwrap();
        a.record_attempt(0, 5).await.unwrap();

        let b = a.namespace("b").unwrap();
        assert_eq!(b.last_attempt(0).await.unwrap(), None);
        assert_eq!(a.last_attempt(0).await.unwrap(), Some(5));

        a.clear(0).await.unwrap();
        assert_eq!(a.last_attempt(0).await.unwrap(), None);
    }
}
