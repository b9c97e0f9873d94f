//! Valuation screen: live multiples against the investor's own entry multiples.

use crate::domain::{Decimal, MetricsMap, Ticker};
use crate::engine::HoldingAggregate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenSide {
    /// Trading below average entry multiples.
    Buy,
    /// Trading above average entry multiples.
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenMetric {
    Pe,
    Pb,
    #[default]
    All,
}

/// One holding's valuation gaps. Positive `pe_diff` means a discount to the
/// average entry P/E; the premium fields are the negation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationGap {
    pub ticker: Ticker,
    pub avg_pe: Decimal,
    pub avg_pb: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_pe: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_pb: Option<Decimal>,
    pub current_price: Decimal,
    pub pe_diff: f64,
    pub pb_diff: f64,
    pub pe_premium: f64,
    pub pb_premium: f64,
    /// Both gaps point the screened way.
    pub dual: bool,
}

impl ValuationGap {
    fn max_buy_gap(&self) -> f64 {
        self.pe_diff.max(self.pb_diff)
    }

    fn max_sell_gap(&self) -> f64 {
        self.pe_premium.max(self.pb_premium)
    }

    fn pe_gap(&self, side: ScreenSide) -> f64 {
        match side {
            ScreenSide::Buy => self.pe_diff,
            ScreenSide::Sell => self.pe_premium,
        }
    }

    fn pb_gap(&self, side: ScreenSide) -> f64 {
        match side {
            ScreenSide::Buy => self.pb_diff,
            ScreenSide::Sell => self.pb_premium,
        }
    }
}

/// `(avg − live) / avg × 100`. A missing or zero live value, or a zero
/// average, gives 0.
fn discount_pct(avg: Decimal, live: Option<Decimal>) -> f64 {
    match live {
        Some(live) if !live.is_zero() => avg
            .checked_sub(live)
            .and_then(|diff| diff.percent_of(avg))
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

pub fn valuation_gap(holding: &HoldingAggregate, metrics: &MetricsMap) -> ValuationGap {
    let live = metrics.get(&holding.ticker).copied().unwrap_or_default();
    let pe_diff = discount_pct(holding.avg_pe, live.pe);
    let pb_diff = discount_pct(holding.avg_pb, live.pb);
    ValuationGap {
        ticker: holding.ticker.clone(),
        avg_pe: holding.avg_pe,
        avg_pb: holding.avg_pb,
        live_pe: live.pe,
        live_pb: live.pb,
        current_price: holding.current_price,
        pe_diff,
        pb_diff,
        pe_premium: -pe_diff,
        pb_premium: -pb_diff,
        dual: false,
    }
}

/// Rank holdings for the given side and metric filter.
///
/// Only holdings with a live P/E or P/B are candidates. BUY keeps discounts
/// and sorts by the larger of the two discounts; SELL does the same with premiums.
pub fn screen(
    holdings: &[HoldingAggregate],
    metrics: &MetricsMap,
    side: ScreenSide,
    metric: ScreenMetric,
) -> Vec<ValuationGap> {
    let mut rows: Vec<ValuationGap> = holdings
        .iter()
        .map(|h| valuation_gap(h, metrics))
        .filter(|g| g.live_pe.is_some() || g.live_pb.is_some())
        .filter(|g| {
            let (pe, pb) = (g.pe_gap(side), g.pb_gap(side));
            match metric {
                ScreenMetric::Pe => pe > 0.0,
                ScreenMetric::Pb => pb > 0.0,
                ScreenMetric::All => pe > 0.0 || pb > 0.0,
            }
        })
        .map(|mut g| {
            g.dual = g.pe_gap(side) > 0.0 && g.pb_gap(side) > 0.0;
            g
        })
        .collect();

    let key = |g: &ValuationGap| match side {
        ScreenSide::Buy => g.max_buy_gap(),
        ScreenSide::Sell => g.max_sell_gap(),
    };
    rows.sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LiveMetrics, LotId, PriceMap, PurchaseLot, TimeMs};
    use crate::engine::aggregate;
    use chrono::NaiveDate;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn lot(ticker: &str, pe: &str, pb: &str) -> PurchaseLot {
        PurchaseLot {
            id: LotId::generate(),
            ticker: Ticker::normalize(ticker),
            purchase_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            price: d("100"),
            quantity: d("1"),
            pe: d(pe),
            pb: d(pb),
            eps: d("5"),
            note: None,
        }
    }

    fn live(pe: Option<&str>, pb: Option<&str>) -> LiveMetrics {
        LiveMetrics {
            pe: pe.map(d),
            pb: pb.map(d),
            eps: None,
        }
    }

    fn fixture() -> (Vec<HoldingAggregate>, MetricsMap) {
        let lots = vec![
            lot("CHEAP", "20", "4"),
            lot("PRICEY", "20", "4"),
            lot("MIXED", "20", "4"),
            lot("NOLIVE", "20", "4"),
        ];
        let holdings = aggregate(&lots, &PriceMap::new(), TimeMs::new(1_735_689_600_000));
        let mut metrics = MetricsMap::new();
        // 25% P/E discount, 50% P/B discount.
        metrics.insert(Ticker::normalize("CHEAP"), live(Some("15"), Some("2")));
        // 50% P/E premium, 25% P/B premium.
        metrics.insert(Ticker::normalize("PRICEY"), live(Some("30"), Some("5")));
        // 10% P/E discount, P/B unknown.
        metrics.insert(Ticker::normalize("MIXED"), live(Some("18"), None));
        (holdings, metrics)
    }

    #[test]
    fn test_discount_pct() {
        assert_eq!(discount_pct(d("20"), Some(d("15"))), 25.0);
        assert_eq!(discount_pct(d("20"), Some(d("30"))), -50.0);
        assert_eq!(discount_pct(d("20"), None), 0.0);
        assert_eq!(discount_pct(d("20"), Some(Decimal::zero())), 0.0);
        assert_eq!(discount_pct(Decimal::zero(), Some(d("12"))), 0.0);
    }

    #[test]
    fn test_buy_screen_ranks_by_largest_discount() {
        let (holdings, metrics) = fixture();
        let rows = screen(&holdings, &metrics, ScreenSide::Buy, ScreenMetric::All);
        let tickers: Vec<&str> = rows.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["CHEAP", "MIXED"]);
        assert!(rows[0].dual);
        assert!(!rows[1].dual);
        assert_eq!(rows[0].pb_diff, 50.0);
    }

    #[test]
    fn test_sell_screen_ranks_by_largest_premium() {
        let (holdings, metrics) = fixture();
        let rows = screen(&holdings, &metrics, ScreenSide::Sell, ScreenMetric::All);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ticker.as_str(), "PRICEY");
        assert_eq!(rows[0].pe_premium, 50.0);
        assert!(rows[0].dual);
    }

    #[test]
    fn test_metric_filter() {
        let (holdings, metrics) = fixture();
        let pb_only = screen(&holdings, &metrics, ScreenSide::Buy, ScreenMetric::Pb);
        assert_eq!(pb_only.len(), 1);
        assert_eq!(pb_only[0].ticker.as_str(), "CHEAP");

        let pe_only = screen(&holdings, &metrics, ScreenSide::Buy, ScreenMetric::Pe);
        assert_eq!(pe_only.len(), 2);
    }

    #[test]
    fn test_holdings_without_live_metrics_are_excluded() {
        let (holdings, metrics) = fixture();
        for side in [ScreenSide::Buy, ScreenSide::Sell] {
            let rows = screen(&holdings, &metrics, side, ScreenMetric::All);
            assert!(rows.iter().all(|r| r.ticker.as_str() != "NOLIVE"));
        }
    }
}
