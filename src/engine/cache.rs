//! Derived-value cache for holdings, keyed by input version.
//!
//! The owner bumps the version whenever lots or prices change. A lookup with
//! the same version on the same UTC day returns the cached view, valued at the
//! `now` of the lookup that computed it. A version bump or a new day recomputes.

use crate::domain::{PriceMap, PurchaseLot, TimeMs};
use crate::engine::aggregator::{aggregate, portfolio_stats, HoldingAggregate, PortfolioStats};
use std::sync::Arc;

/// Holdings and portfolio totals computed from one input version.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingsView {
    pub version: u64,
    pub now: TimeMs,
    pub holdings: Vec<HoldingAggregate>,
    pub stats: PortfolioStats,
}

#[derive(Debug, Default)]
pub struct HoldingsCache {
    current: Option<Arc<HoldingsView>>,
    recomputations: u64,
}

impl HoldingsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(
        &mut self,
        version: u64,
        now: TimeMs,
        lots: &[PurchaseLot],
        prices: &PriceMap,
    ) -> Arc<HoldingsView> {
        if let Some(view) = &self.current {
            if view.version == version && view.now.date() == now.date() {
                return Arc::clone(view);
            }
        }

        let holdings = aggregate(lots, prices, now);
        let stats = portfolio_stats(&holdings, lots, now);
        let view = Arc::new(HoldingsView {
            version,
            now,
            holdings,
            stats,
        });
        self.current = Some(Arc::clone(&view));
        self.recomputations += 1;
        view
    }

    /// Drop the cached view; the next lookup recomputes.
    pub fn invalidate(&mut self) {
        self.current = None;
    }

    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }
}
