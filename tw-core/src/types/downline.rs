//! Downline listing types

use serde::{Deserialize, Serialize};

use super::common::Address;

/// One participant in a downline listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownlineEntry {
    pub address: Address,
    pub sponsor: Address,
    pub direct_referrals: u32,
    pub current_level: u8,
}

/// One page of the downline at a given depth
///
/// Rebuilt for every (depth, page) request. Entries keep the ledger's order.
/// `total_count` is the size of the whole depth, not of this page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownlinePage {
    pub entries: Vec<DownlineEntry>,
    pub total_count: u64,
}

impl DownlinePage {
    /// The page returned when a read fails
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.entries.iter().map(|e| e.address).collect()
    }
}
