//! Matrix position resolution
//!
//! Sponsor lookups are essential and propagate their errors. Downline and
//! direct-referral listings and the referral code are display-only and
//! degrade to empty values.

use std::sync::Arc;
use tracing::{debug, warn};

use tw_core::{Address, DownlinePage, Participant, ReferralPage, Sponsors};

use crate::error::EngineResult;
use crate::ledger::Ledger;

/// Resolves sponsors and downline pages for a participant
pub struct MatrixPositionResolver {
    ledger: Arc<dyn Ledger>,
}

impl MatrixPositionResolver {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Direct and matrix sponsor, one hop up
    pub async fn get_sponsors(&self, address: &Address) -> EngineResult<Sponsors> {
        self.ledger.matrix_position(address).await.map_err(|e| {
            warn!(address = %address, error = %e, "Sponsor lookup failed");
            e
        })
    }

    /// Level plus sponsors
    pub async fn get_participant(&self, address: &Address) -> EngineResult<Participant> {
        let (level, sponsors) = tokio::try_join!(
            self.ledger.current_level(address),
            self.get_sponsors(address)
        )?;
        Ok(Participant {
            address: *address,
            current_level: level,
            direct_sponsor: sponsors.direct_sponsor,
            matrix_sponsor: sponsors.matrix_sponsor,
        })
    }

    /// One page of the downline at `depth` (1 = direct children)
    ///
    /// Never fails: a failed read or a zero depth yields an empty page with
    /// `total_count = 0`. The ledger's order is kept as-is.
    pub async fn get_downline_by_depth(
        &self,
        address: &Address,
        depth: u32,
        start_index: u64,
        limit: u64,
    ) -> DownlinePage {
        if depth == 0 {
            debug!(address = %address, "Downline depth 0 requested");
            return DownlinePage::empty();
        }

        match self
            .ledger
            .downline_by_depth(address, depth, start_index, limit)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                warn!(address = %address, depth, start_index, limit, error = %e, "Downline read failed");
                DownlinePage::empty()
            }
        }
    }

    /// Page `page` (1-based; 0 is treated as 1) of the direct referrals
    pub async fn get_direct_referrals(
        &self,
        address: &Address,
        page: u64,
        items_per_page: u64,
    ) -> ReferralPage {
        if items_per_page == 0 {
            return ReferralPage::empty();
        }
        let start = page.max(1).saturating_sub(1).saturating_mul(items_per_page);

        match self
            .ledger
            .direct_referrals(address, start, items_per_page)
            .await
        {
            Ok(mut p) => {
                p.entries
                    .truncate(usize::try_from(items_per_page).unwrap_or(usize::MAX));
                p
            }
            Err(e) => {
                warn!(address = %address, page, error = %e, "Direct referral read failed");
                ReferralPage::empty()
            }
        }
    }

    /// On-chain referral code, `None` when unset or unreadable
    pub async fn get_referral_code(&self, address: &Address) -> Option<String> {
        match self.ledger.referral_code(address).await {
            Ok(code) if code.trim().is_empty() => None,
            Ok(code) => Some(code.trim().to_string()),
            Err(e) => {
                warn!(address = %address, error = %e, "Referral code read failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::ledger::MockLedger;
    use tw_core::{DirectReferral, DownlineEntry};

    fn addr(b: u8) -> Address {
        Address([b; 20])
    }

    fn setup() -> (Arc<MockLedger>, MatrixPositionResolver) {
        let ledger = Arc::new(MockLedger::new());
        let resolver = MatrixPositionResolver::new(ledger.clone());
        (ledger, resolver)
    }

    #[tokio::test]
    async fn test_sponsors_propagate_errors() {
        let (ledger, resolver) = setup();
        ledger.set_sponsors(
            addr(1),
            Sponsors {
                direct_sponsor: addr(2),
                matrix_sponsor: addr(3),
            },
        );
        let sponsors = resolver.get_sponsors(&addr(1)).await.unwrap();
        assert_eq!(sponsors.matrix_sponsor, addr(3));

        ledger.fail_read("getMatrixPosition");
        assert!(matches!(
            resolver.get_sponsors(&addr(1)).await,
            Err(EngineError::Read(_))
        ));
        assert!(resolver.get_participant(&addr(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_downline_failure_degrades_to_empty() {
        let (ledger, resolver) = setup();
        ledger.set_downline(
            addr(1),
            1,
            vec![DownlineEntry {
                address: addr(4),
                sponsor: addr(1),
                direct_referrals: 0,
                current_level: 1,
            }],
        );
        let page = resolver.get_downline_by_depth(&addr(1), 1, 0, 10).await;
        assert_eq!(page.total_count, 1);

        ledger.fail_read("getDownlineByDepthPaginated");
        let page = resolver.get_downline_by_depth(&addr(1), 1, 0, 10).await;
        assert!(page.is_empty());
        assert_eq!(page.total_count, 0);
    }

    #[tokio::test]
    async fn test_depth_zero_skips_ledger() {
        let (ledger, resolver) = setup();
        let page = resolver.get_downline_by_depth(&addr(1), 0, 0, 10).await;
        assert!(page.is_empty());
        assert!(ledger.reads().is_empty());
    }

    fn referral(b: u8) -> DirectReferral {
        DirectReferral {
            address: addr(b),
            activation_time: 1_700_000_000 + u64::from(b),
            current_level: 1,
            direct_referrals: 0,
        }
    }

    #[tokio::test]
    async fn test_direct_referrals_pages() {
        let (ledger, resolver) = setup();
        ledger.set_direct_referrals(addr(1), (10..17).map(referral).collect());

        let first = resolver.get_direct_referrals(&addr(1), 1, 3).await;
        let third = resolver.get_direct_referrals(&addr(1), 3, 3).await;
        assert_eq!(first.addresses(), vec![addr(10), addr(11), addr(12)]);
        assert_eq!(third.addresses(), vec![addr(16)]);
        assert_eq!(third.total_count, 7);
        assert_eq!(first.total_pages(3), 3);

        // page 0 reads the first page
        assert_eq!(resolver.get_direct_referrals(&addr(1), 0, 3).await, first);
    }

    #[tokio::test]
    async fn test_direct_referrals_degrade() {
        let (ledger, resolver) = setup();
        ledger.set_direct_referrals(addr(1), vec![referral(10)]);
        ledger.fail_read("getDirectReferralDataPaginated");

        let page = resolver.get_direct_referrals(&addr(1), 1, 5).await;
        assert!(page.is_empty());
        assert_eq!(page.total_count, 0);

        let before = ledger.reads().len();
        assert!(resolver.get_direct_referrals(&addr(1), 1, 0).await.is_empty());
        assert_eq!(ledger.reads().len(), before);
    }

    #[tokio::test]
    async fn test_referral_code() {
        let (ledger, resolver) = setup();
        assert_eq!(resolver.get_referral_code(&addr(1)).await, None);

        ledger.set_referral_code(addr(1), "TW7Q2K");
        assert_eq!(resolver.get_referral_code(&addr(1)).await.as_deref(), Some("TW7Q2K"));

        ledger.fail_read("getReferralCode");
        assert_eq!(resolver.get_referral_code(&addr(1)).await, None);
    }

    #[tokio::test]
    async fn test_participant() {
        let (ledger, resolver) = setup();
        ledger.set_level(addr(1), 4);
        let p = resolver.get_participant(&addr(1)).await.unwrap();
        assert_eq!(p.current_level, 4);
        assert_eq!(p.level_name(), "Challenger");
        assert!(p.direct_sponsor.is_zero());
    }
}
