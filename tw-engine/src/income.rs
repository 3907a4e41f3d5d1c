//! Income event aggregation
//!
//! Builds one page of a participant's income history. Two strategies:
//!
//! - **Server-paginated**: the ledger returns exactly the requested page and
//!   its total; nothing is reordered.
//! - **Client-aggregated**: a bounded window is fetched, sorted newest first
//!   (stable, so equal timestamps keep the ledger's order) and sliced.
//!
//! Type filters are passed to the ledger when it supports them and applied
//! locally, before sorting, when it does not. A server page cannot be filtered
//! locally without losing its neighbours, so a server-paginated request with
//! an unsupported filter is served from the bounded window instead. A failed
//! read yields an empty page; the aggregator never returns an error.

use std::sync::Arc;
use tracing::{debug, warn};

use tw_core::{
    Address, IncomeEvent, IncomePage, IncomeSummary, IncomeType, RankIncome, DEFAULT_INCOME_WINDOW,
};

use crate::config::IncomeStrategy;
use crate::ledger::Ledger;

/// Fetches, filters, sorts and paginates income events
pub struct IncomeEventAggregator {
    ledger: Arc<dyn Ledger>,
    strategy: IncomeStrategy,
    ledger_filters: bool,
}

impl IncomeEventAggregator {
    pub fn new(ledger: Arc<dyn Ledger>, strategy: IncomeStrategy, ledger_filters: bool) -> Self {
        Self {
            ledger,
            strategy,
            ledger_filters,
        }
    }

    pub fn strategy(&self) -> IncomeStrategy {
        self.strategy
    }

    /// Page `page` (1-based; 0 is treated as 1) of at most `items_per_page` events
    ///
    /// `total_count` is the ledger's total for the filter, not the number of
    /// events fetched. When the filter had to be applied locally, the ledger
    /// cannot know the filtered total, so the filtered window size is used.
    pub async fn fetch_page(
        &self,
        address: &Address,
        page: u64,
        items_per_page: u64,
        filter: &[IncomeType],
    ) -> IncomePage {
        if items_per_page == 0 {
            return IncomePage::empty();
        }
        let page = page.max(1);

        let result = match self.strategy {
            IncomeStrategy::ServerPaginated if !self.ledger_filters && !filter.is_empty() => {
                debug!(address = %address, "Ledger cannot filter income, using the window");
                self.fetch_client_page(address, page, items_per_page, filter, DEFAULT_INCOME_WINDOW)
                    .await
            }
            IncomeStrategy::ServerPaginated => {
                self.fetch_server_page(address, page, items_per_page, filter)
                    .await
            }
            IncomeStrategy::ClientAggregated { window } => {
                self.fetch_client_page(address, page, items_per_page, filter, window)
                    .await
            }
        };

        match result {
            Ok(p) => p,
            Err(e) => {
                warn!(address = %address, page, error = %e, "Income read failed");
                IncomePage::empty()
            }
        }
    }

    /// Aggregated income figures, `None` when the read fails
    pub async fn summary(&self, address: &Address) -> Option<IncomeSummary> {
        match self.ledger.complete_stats(address).await {
            Ok(s) => Some(s),
            Err(e) => {
                warn!(address = %address, error = %e, "Income summary read failed");
                None
            }
        }
    }

    /// Per-level team income and the direct commission, `None` when either
    /// read fails
    pub async fn rank_income(&self, address: &Address) -> Option<RankIncome> {
        match tokio::try_join!(
            self.ledger.team_level_incomes(address),
            self.ledger.direct_commission(address)
        ) {
            Ok((level_incomes, direct_commission)) => Some(RankIncome {
                level_incomes,
                direct_commission,
            }),
            Err(e) => {
                warn!(address = %address, error = %e, "Rank income read failed");
                None
            }
        }
    }

    async fn fetch_server_page(
        &self,
        address: &Address,
        page: u64,
        items_per_page: u64,
        filter: &[IncomeType],
    ) -> crate::error::EngineResult<IncomePage> {
        let start = (page - 1).saturating_mul(items_per_page);
        let mut result = self
            .ledger
            .recent_income_events(address, start, items_per_page, filter)
            .await?;
        result
            .events
            .truncate(usize::try_from(items_per_page).unwrap_or(usize::MAX));
        Ok(result)
    }

    async fn fetch_client_page(
        &self,
        address: &Address,
        page: u64,
        items_per_page: u64,
        filter: &[IncomeType],
        window: u64,
    ) -> crate::error::EngineResult<IncomePage> {
        let pushed: &[IncomeType] = if self.ledger_filters { filter } else { &[] };
        let fetched = self
            .ledger
            .recent_income_events(address, 0, window, pushed)
            .await?;

        let mut events = fetched.events;
        let mut total_count = fetched.total_count;
        if !self.ledger_filters && !filter.is_empty() {
            retain_types(&mut events, filter);
            total_count = events.len() as u64;
        }

        sort_newest_first(&mut events);
        debug!(
            address = %address,
            fetched = events.len(),
            total_count,
            "Income window sorted"
        );

        Ok(IncomePage {
            events: slice_page(events, page, items_per_page),
            total_count,
        })
    }
}

fn retain_types(events: &mut Vec<IncomeEvent>, filter: &[IncomeType]) {
    events.retain(|e| filter.contains(&e.income_type));
}

/// Descending by timestamp; equal timestamps keep their order
pub fn sort_newest_first(events: &mut [IncomeEvent]) {
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Events `[(page-1)*n, page*n)` of an already ordered list
pub fn slice_page(events: Vec<IncomeEvent>, page: u64, items_per_page: u64) -> Vec<IncomeEvent> {
    let start = page.saturating_sub(1).saturating_mul(items_per_page);
    let start = usize::try_from(start).unwrap_or(usize::MAX);
    let n = usize::try_from(items_per_page).unwrap_or(usize::MAX);
    events.into_iter().skip(start).take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MockLedger;
    use tw_core::LevelIncome;

    fn addr(b: u8) -> Address {
        Address([b; 20])
    }

    fn event(ts: u64, ty: IncomeType, tag: u8) -> IncomeEvent {
        IncomeEvent {
            address: addr(tag),
            level_number: 1,
            amount: 1,
            timestamp: ts,
            income_type: ty,
        }
    }

    fn aggregator(ledger: &Arc<MockLedger>, strategy: IncomeStrategy, filters: bool) -> IncomeEventAggregator {
        IncomeEventAggregator::new(ledger.clone(), strategy, filters)
    }

    #[tokio::test]
    async fn test_client_sorts_descending_with_stable_ties() {
        let ledger = Arc::new(MockLedger::new());
        let user = addr(1);
        ledger.push_income(
            user,
            vec![
                event(100, IncomeType::DirectReferral, 10),
                event(300, IncomeType::LevelIncome, 11),
                event(200, IncomeType::LevelIncome, 12),
                event(300, IncomeType::BonusIncome, 13),
            ],
        );

        let agg = aggregator(&ledger, IncomeStrategy::ClientAggregated { window: 1000 }, true);
        let page = agg.fetch_page(&user, 1, 3, &[]).await;
        let tags: Vec<u8> = page.events.iter().map(|e| e.address.0[0]).collect();
        assert_eq!(tags, vec![11, 13, 12]);
        assert_eq!(page.total_count, 4);

        let page2 = agg.fetch_page(&user, 2, 3, &[]).await;
        assert_eq!(page2.events.len(), 1);
        assert_eq!(page2.events[0].timestamp, 100);
    }

    #[tokio::test]
    async fn test_total_count_is_ledger_total_not_window() {
        let ledger = Arc::new(MockLedger::new());
        let user = addr(1);
        ledger.push_income(user, (0..10).map(|i| event(i, IncomeType::LevelIncome, i as u8)));

        let agg = aggregator(&ledger, IncomeStrategy::ClientAggregated { window: 4 }, true);
        let page = agg.fetch_page(&user, 1, 5, &[]).await;
        assert_eq!(page.events.len(), 4);
        assert_eq!(page.total_count, 10);
    }

    #[tokio::test]
    async fn test_local_filter_applied_before_sort() {
        let ledger = Arc::new(MockLedger::new());
        let user = addr(1);
        ledger.ignore_income_filter();
        ledger.push_income(
            user,
            vec![
                event(500, IncomeType::BonusIncome, 1),
                event(100, IncomeType::DirectReferral, 2),
                event(400, IncomeType::DirectReferral, 3),
            ],
        );

        let agg = aggregator(&ledger, IncomeStrategy::ClientAggregated { window: 1000 }, false);
        let page = agg.fetch_page(&user, 1, 5, &[IncomeType::DirectReferral]).await;
        let ts: Vec<u64> = page.events.iter().map(|e| e.timestamp).collect();
        assert_eq!(ts, vec![400, 100]);
        assert_eq!(page.total_count, 2);
    }

    #[tokio::test]
    async fn test_server_paginated_trusts_ledger_order() {
        let ledger = Arc::new(MockLedger::new());
        let user = addr(1);
        ledger.push_income(
            user,
            vec![
                event(1, IncomeType::LevelIncome, 1),
                event(3, IncomeType::LevelIncome, 2),
                event(2, IncomeType::UpgradeReferral, 3),
            ],
        );

        let agg = aggregator(&ledger, IncomeStrategy::ServerPaginated, true);
        let page = agg.fetch_page(&user, 1, 2, &[]).await;
        let ts: Vec<u64> = page.events.iter().map(|e| e.timestamp).collect();
        assert_eq!(ts, vec![1, 3]);
        assert_eq!(page.total_count, 3);

        let filtered = agg.fetch_page(&user, 1, 2, &[IncomeType::UpgradeReferral]).await;
        assert_eq!(filtered.events.len(), 1);
        assert_eq!(filtered.total_count, 1);
    }

    #[tokio::test]
    async fn test_server_paginated_unfiltered_ledger_pages_through_window() {
        let ledger = Arc::new(MockLedger::new());
        let user = addr(1);
        ledger.ignore_income_filter();
        ledger.push_income(
            user,
            (0..20u64).map(|i| {
                let ty = if i % 2 == 0 {
                    IncomeType::DirectReferral
                } else {
                    IncomeType::LevelIncome
                };
                event(i, ty, i as u8)
            }),
        );

        let agg = aggregator(&ledger, IncomeStrategy::ServerPaginated, false);
        let filter = [IncomeType::DirectReferral];
        let p1 = agg.fetch_page(&user, 1, 5, &filter).await;
        let p2 = agg.fetch_page(&user, 2, 5, &filter).await;
        let p3 = agg.fetch_page(&user, 3, 5, &filter).await;

        assert_eq!(p1.events.len(), 5);
        assert_eq!(p2.events.len(), 5);
        assert!(p3.events.is_empty());
        assert_eq!(p1.total_count, 10);
        assert_eq!(p1.total_pages(5), 2);

        let seen: Vec<u64> = p1.events.iter().chain(&p2.events).map(|e| e.timestamp).collect();
        assert_eq!(seen, vec![18, 16, 14, 12, 10, 8, 6, 4, 2, 0]);
        assert!(p1
            .events
            .iter()
            .all(|e| e.income_type == IncomeType::DirectReferral));
    }

    #[tokio::test]
    async fn test_failure_yields_empty_page() {
        let ledger = Arc::new(MockLedger::new());
        ledger.fail_read("getRecentIncomeEventsPaginated");
        for strategy in [
            IncomeStrategy::ServerPaginated,
            IncomeStrategy::ClientAggregated { window: 10 },
        ] {
            let page = aggregator(&ledger, strategy, true)
                .fetch_page(&addr(1), 1, 5, &[])
                .await;
            assert!(page.events.is_empty());
            assert_eq!(page.total_count, 0);
        }
    }

    #[tokio::test]
    async fn test_summary_degrades_to_none() {
        let ledger = Arc::new(MockLedger::new());
        let agg = aggregator(&ledger, IncomeStrategy::ServerPaginated, true);
        assert!(agg.summary(&addr(1)).await.is_some());
        ledger.fail_read("getUserCompleteStats");
        assert!(agg.summary(&addr(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_rank_income() {
        let ledger = Arc::new(MockLedger::new());
        let user = addr(1);
        ledger.set_team_incomes(
            user,
            vec![
                LevelIncome { level: 1, amount: 3 * tw_core::ONE_TOKEN },
                LevelIncome { level: 2, amount: tw_core::ONE_TOKEN },
            ],
        );
        ledger.set_direct_commission(user, 2 * tw_core::ONE_TOKEN);

        let agg = aggregator(&ledger, IncomeStrategy::ServerPaginated, true);
        let income = agg.rank_income(&user).await.unwrap();
        assert_eq!(income.level_incomes.len(), 2);
        assert_eq!(income.direct_commission, 2 * tw_core::ONE_TOKEN);
        assert_eq!(income.total(), 6 * tw_core::ONE_TOKEN);

        ledger.fail_read("getUserTeamStats");
        assert!(agg.rank_income(&user).await.is_none());
    }

    #[tokio::test]
    async fn test_zero_page_size() {
        let ledger = Arc::new(MockLedger::new());
        let page = aggregator(&ledger, IncomeStrategy::ServerPaginated, true)
            .fetch_page(&addr(1), 1, 0, &[])
            .await;
        assert!(page.events.is_empty());
        assert!(ledger.reads().is_empty());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;
        use std::collections::HashSet;

        proptest! {
            #[test]
            fn prop_pages_bounded_and_disjoint(
                timestamps in proptest::collection::vec(0u64..50, 0..60),
                per_page in 1u64..12,
                page in 1u64..8
            ) {
                let events: Vec<IncomeEvent> = timestamps
                    .iter()
                    .enumerate()
                    .map(|(i, &ts)| IncomeEvent {
                        address: Address::ZERO,
                        level_number: (i % 200) as u8,
                        amount: i as u128,
                        timestamp: ts,
                        income_type: IncomeType::LevelIncome,
                    })
                    .collect();

                let mut sorted = events.clone();
                sort_newest_first(&mut sorted);
                prop_assert!(sorted.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

                let p = slice_page(sorted.clone(), page, per_page);
                let q = slice_page(sorted, page + 1, per_page);
                prop_assert!(p.len() as u64 <= per_page);
                prop_assert!(q.len() as u64 <= per_page);

                // amount carries the original index, so it identifies an event
                let ids: HashSet<u128> = p.iter().map(|e| e.amount).collect();
                prop_assert!(q.iter().all(|e| !ids.contains(&e.amount)));
            }
        }
    }
}
