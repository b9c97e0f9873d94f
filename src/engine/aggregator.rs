//! Lot aggregation: per-ticker holdings, cash-flow series, portfolio totals.

use crate::domain::cashflow::sort_by_time;
use crate::domain::{CashFlow, Decimal, PriceMap, PurchaseLot, Ticker, TimeMs};
use crate::engine::xirr;
use serde::Serialize;
use std::collections::BTreeMap;

/// Derived holding for one normalized ticker. Never stored; always recomputed
/// from lots and current prices.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingAggregate {
    #[serde(rename = "name")]
    pub ticker: Ticker,
    #[serde(rename = "count")]
    pub lot_count: usize,
    pub total_quantity: Decimal,
    pub total_invested: Decimal,
    /// `total_invested / total_quantity`, or 0 when there is no valid basis.
    pub weighted_avg_price: Decimal,
    /// Unweighted mean across lots.
    pub avg_pe: Decimal,
    pub avg_pb: Decimal,
    pub avg_eps: Decimal,
    pub current_price: Decimal,
    /// Annualized money-weighted return, as a percentage.
    pub xirr: f64,
    #[serde(rename = "purchases")]
    pub lots: Vec<PurchaseLot>,
}

impl HoldingAggregate {
    /// False when the lots sum to zero quantity, so there is no average cost.
    pub fn has_valid_basis(&self) -> bool {
        !self.total_quantity.is_zero()
    }

    pub fn current_value(&self) -> Decimal {
        self.current_price.saturating_mul(self.total_quantity)
    }

    pub fn unrealized_gain(&self) -> Decimal {
        self.current_value().saturating_sub(self.total_invested)
    }

    /// Price gain over average cost, in percent. 0 without a valid basis.
    pub fn gain_percent(&self) -> f64 {
        if !self.has_valid_basis() {
            return 0.0;
        }
        self.current_price
            .checked_sub(self.weighted_avg_price)
            .and_then(|diff| diff.percent_of(self.weighted_avg_price))
            .unwrap_or(0.0)
    }
}

/// Mean P/E, P/B and EPS over a set of lots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RatioMeans {
    pub pe: Decimal,
    pub pb: Decimal,
    pub eps: Decimal,
}

/// Arithmetic mean across lots, each lot counting once regardless of size.
/// This is what holdings report.
pub fn unweighted_ratio_means(lots: &[PurchaseLot]) -> RatioMeans {
    let n = Decimal::from(lots.len() as i64);
    let mean = |field: fn(&PurchaseLot) -> Decimal| -> Decimal {
        let total: Decimal = lots.iter().map(field).sum();
        total.checked_div(n).unwrap_or_default()
    };
    RatioMeans {
        pe: mean(lot_pe),
        pb: mean(lot_pb),
        eps: mean(lot_eps),
    }
}

/// Quantity-weighted mean across lots. Not used by `aggregate`; available for
/// comparison with the unweighted figures.
pub fn weighted_ratio_means(lots: &[PurchaseLot]) -> RatioMeans {
    let total_qty: Decimal = lots.iter().map(|l| l.quantity).sum();
    let mean = |field: fn(&PurchaseLot) -> Decimal| -> Decimal {
        let total: Decimal = lots
            .iter()
            .map(|l| field(l).saturating_mul(l.quantity))
            .sum();
        total.checked_div(total_qty).unwrap_or_default()
    };
    RatioMeans {
        pe: mean(lot_pe),
        pb: mean(lot_pb),
        eps: mean(lot_eps),
    }
}

fn lot_pe(lot: &PurchaseLot) -> Decimal {
    lot.pe
}

fn lot_pb(lot: &PurchaseLot) -> Decimal {
    lot.pb
}

fn lot_eps(lot: &PurchaseLot) -> Decimal {
    lot.eps
}

/// Group lots by ticker and compute one aggregate per group.
///
/// Output is sorted by descending total invested; ties fall back to ascending
/// ticker. `now` dates the terminal valuation flow of every per-ticker solve.
pub fn aggregate(lots: &[PurchaseLot], prices: &PriceMap, now: TimeMs) -> Vec<HoldingAggregate> {
    let mut groups: BTreeMap<Ticker, Vec<PurchaseLot>> = BTreeMap::new();
    for lot in lots {
        groups.entry(lot.ticker.clone()).or_default().push(lot.clone());
    }

    let mut aggregates: Vec<HoldingAggregate> = groups
        .into_iter()
        .map(|(ticker, items)| {
            let current_price = prices.get(&ticker).copied().unwrap_or_default();
            build_aggregate(ticker, items, current_price, now)
        })
        .collect();

    aggregates.sort_by(|a, b| b.total_invested.cmp(&a.total_invested));
    aggregates
}

fn build_aggregate(
    ticker: Ticker,
    lots: Vec<PurchaseLot>,
    current_price: Decimal,
    now: TimeMs,
) -> HoldingAggregate {
    let total_quantity: Decimal = lots.iter().map(|l| l.quantity).sum();
    let total_invested: Decimal = lots.iter().map(PurchaseLot::invested).sum();
    let weighted_avg_price = total_invested
        .checked_div(total_quantity)
        .unwrap_or_default();
    let means = unweighted_ratio_means(&lots);

    let flows = holding_flows(&lots, current_price.saturating_mul(total_quantity), now);
    let xirr = xirr::solve_rate(&flows);

    HoldingAggregate {
        ticker,
        lot_count: lots.len(),
        total_quantity,
        total_invested,
        weighted_avg_price,
        avg_pe: means.pe,
        avg_pb: means.pb,
        avg_eps: means.eps,
        current_price,
        xirr,
        lots,
    }
}

fn purchase_outflows(lots: &[PurchaseLot]) -> Vec<CashFlow> {
    lots.iter()
        .map(|lot| CashFlow::new(-lot.invested().to_f64(), lot.purchased_at()))
        .collect()
}

/// Series for one holding: each lot's outflow plus a terminal inflow of
/// `current_value` at `now`. The terminal flow is present even when zero.
pub fn holding_flows(lots: &[PurchaseLot], current_value: Decimal, now: TimeMs) -> Vec<CashFlow> {
    let mut flows = purchase_outflows(lots);
    flows.push(CashFlow::new(current_value.to_f64(), now));
    sort_by_time(&mut flows);
    flows
}

/// Series for the whole portfolio. Unlike `holding_flows`, the terminal inflow
/// is left out when the total current value is exactly zero.
pub fn portfolio_flows(
    lots: &[PurchaseLot],
    total_current_value: Decimal,
    now: TimeMs,
) -> Vec<CashFlow> {
    let mut flows = purchase_outflows(lots);
    if !total_current_value.is_zero() {
        flows.push(CashFlow::new(total_current_value.to_f64(), now));
    }
    sort_by_time(&mut flows);
    flows
}

/// Portfolio-level totals and return.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioStats {
    pub total_invested: Decimal,
    pub total_current_value: Decimal,
    pub total_gain: Decimal,
    pub total_gain_percent: f64,
    pub portfolio_xirr: f64,
}

pub fn portfolio_stats(
    aggregates: &[HoldingAggregate],
    lots: &[PurchaseLot],
    now: TimeMs,
) -> PortfolioStats {
    let total_invested: Decimal = aggregates.iter().map(|a| a.total_invested).sum();
    let total_current_value: Decimal = aggregates.iter().map(|a| a.current_value()).sum();
    let total_gain = total_current_value.saturating_sub(total_invested);
    let total_gain_percent = if total_invested.is_positive() {
        total_gain.percent_of(total_invested).unwrap_or(0.0)
    } else {
        0.0
    };

    let flows = portfolio_flows(lots, total_current_value, now);
    let portfolio_xirr = xirr::solve_rate(&flows);

    PortfolioStats {
        total_invested,
        total_current_value,
        total_gain,
        total_gain_percent,
        portfolio_xirr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LotId;
    use chrono::NaiveDate;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn lot(ticker: &str, date: &str, price: &str, qty: &str) -> PurchaseLot {
        PurchaseLot {
            id: LotId::generate(),
            ticker: Ticker::normalize(ticker),
            purchase_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            price: d(price),
            quantity: d(qty),
            pe: d("20"),
            pb: d("4"),
            eps: d("10"),
            note: None,
        }
    }

    fn now() -> TimeMs {
        TimeMs::from_date(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
    }

    #[test]
    fn test_empty_input_yields_no_aggregates() {
        assert!(aggregate(&[], &PriceMap::new(), now()).is_empty());
    }

    #[test]
    fn test_weighted_average_price() {
        let lots = vec![
            lot("X", "2024-01-01", "100", "10"),
            lot("X", "2024-06-01", "200", "10"),
        ];
        let aggs = aggregate(&lots, &PriceMap::new(), now());
        assert_eq!(aggs.len(), 1);
        assert_eq!(aggs[0].weighted_avg_price, d("150"));
        assert_eq!(aggs[0].total_quantity, d("20"));
        assert_eq!(aggs[0].total_invested, d("3000"));
        assert_eq!(aggs[0].lot_count, 2);
    }

    #[test]
    fn test_zero_quantity_has_no_basis() {
        let mut l = lot("Z", "2024-01-01", "100", "1");
        l.quantity = Decimal::zero();
        let aggs = aggregate(&[l], &PriceMap::new(), now());
        assert_eq!(aggs[0].weighted_avg_price, Decimal::zero());
        assert!(!aggs[0].has_valid_basis());
        assert_eq!(aggs[0].gain_percent(), 0.0);
        assert!(aggs[0].xirr.is_finite());
    }

    #[test]
    fn test_missing_price_defaults_to_zero() {
        let aggs = aggregate(&[lot("X", "2024-01-01", "10", "1")], &PriceMap::new(), now());
        assert_eq!(aggs[0].current_price, Decimal::zero());
        assert_eq!(aggs[0].current_value(), Decimal::zero());
    }

    #[test]
    fn test_ratio_means_are_unweighted() {
        let mut a = lot("X", "2024-01-01", "100", "1");
        a.pe = d("10");
        let mut b = lot("X", "2024-02-01", "100", "3");
        b.pe = d("30");
        let lots = vec![a, b];

        let aggs = aggregate(&lots, &PriceMap::new(), now());
        assert_eq!(aggs[0].avg_pe, d("20"));

        // Quantity weighting would give (10*1 + 30*3) / 4 = 25.
        assert_eq!(weighted_ratio_means(&lots).pe, d("25"));
        assert_eq!(unweighted_ratio_means(&lots).pe, d("20"));
    }

    #[test]
    fn test_ordering_by_total_invested_desc() {
        let lots = vec![
            lot("A", "2024-01-01", "500", "1"),
            lot("B", "2024-01-01", "2000", "1"),
            lot("C", "2024-01-01", "1000", "1"),
        ];
        let aggs = aggregate(&lots, &PriceMap::new(), now());
        let invested: Vec<Decimal> = aggs.iter().map(|a| a.total_invested).collect();
        assert_eq!(invested, vec![d("2000"), d("1000"), d("500")]);
    }

    #[test]
    fn test_ties_break_by_ticker() {
        let lots = vec![
            lot("ZED", "2024-01-01", "100", "1"),
            lot("ALPHA", "2024-01-01", "100", "1"),
        ];
        let aggs = aggregate(&lots, &PriceMap::new(), now());
        assert_eq!(aggs[0].ticker.as_str(), "ALPHA");
        assert_eq!(aggs[1].ticker.as_str(), "ZED");
    }

    #[test]
    fn test_holding_flows_include_zero_terminal() {
        let lots = vec![lot("X", "2024-01-01", "100", "1")];
        let flows = holding_flows(&lots, Decimal::zero(), now());
        assert_eq!(flows.len(), 2);
        assert_eq!(flows[1].amount, 0.0);
        assert_eq!(flows[1].time_ms, now());
    }

    #[test]
    fn test_portfolio_flows_omit_zero_terminal() {
        let lots = vec![lot("X", "2024-01-01", "100", "1")];
        let flows = portfolio_flows(&lots, Decimal::zero(), now());
        assert_eq!(flows.len(), 1);
        // A lone outflow is unsolvable: the portfolio rate is 0.
        assert_eq!(xirr::solve_rate(&flows), 0.0);

        let flows = portfolio_flows(&lots, d("150"), now());
        assert_eq!(flows.len(), 2);
    }

    #[test]
    fn test_flows_sorted_by_date() {
        let lots = vec![
            lot("X", "2024-06-01", "100", "1"),
            lot("X", "2023-01-01", "100", "1"),
        ];
        let flows = holding_flows(&lots, d("250"), now());
        assert!(flows.windows(2).all(|w| w[0].time_ms <= w[1].time_ms));
        assert_eq!(
            flows[0].time_ms,
            TimeMs::from_date(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap())
        );
    }

    #[test]
    fn test_holding_xirr_one_year() {
        let lots = vec![lot("X", "2024-01-01", "100", "1")];
        let mut prices = PriceMap::new();
        prices.insert(Ticker::normalize("x"), d("110"));
        // 2024-01-01 to 2025-01-01 is 366 days (leap year), so slightly under 10%.
        let aggs = aggregate(&lots, &prices, now());
        let expected = (1.1f64.powf(365.0 / 366.0) - 1.0) * 100.0;
        assert!((aggs[0].xirr - expected).abs() < 0.01, "got {}", aggs[0].xirr);
    }

    #[test]
    fn test_portfolio_stats() {
        let lots = vec![
            lot("A", "2024-01-01", "100", "10"),
            lot("B", "2024-01-01", "50", "10"),
        ];
        let mut prices = PriceMap::new();
        prices.insert(Ticker::normalize("A"), d("120"));
        prices.insert(Ticker::normalize("B"), d("60"));
        let aggs = aggregate(&lots, &prices, now());
        let stats = portfolio_stats(&aggs, &lots, now());
        assert_eq!(stats.total_invested, d("1500"));
        assert_eq!(stats.total_current_value, d("1800"));
        assert_eq!(stats.total_gain, d("300"));
        assert!((stats.total_gain_percent - 20.0).abs() < 1e-9);
        assert!(stats.portfolio_xirr > 19.0 && stats.portfolio_xirr < 20.0);
    }

    #[test]
    fn test_portfolio_stats_empty() {
        let stats = portfolio_stats(&[], &[], now());
        assert_eq!(stats.total_invested, Decimal::zero());
        assert_eq!(stats.total_gain_percent, 0.0);
        assert_eq!(stats.portfolio_xirr, 0.0);
    }

    #[test]
    fn test_gain_percent() {
        let lots = vec![lot("A", "2024-01-01", "200", "5")];
        let mut prices = PriceMap::new();
        prices.insert(Ticker::normalize("A"), d("150"));
        let aggs = aggregate(&lots, &prices, now());
        assert!((aggs[0].gain_percent() + 25.0).abs() < 1e-9);
        assert_eq!(aggs[0].unrealized_gain(), d("-250"));
    }

    #[test]
    fn test_out_of_range_stored_lots_saturate() {
        let max = Decimal::from(rust_decimal::Decimal::MAX);
        let huge = lot("BIG", "2024-01-01", "1e15", "1e15");
        let half = lot("BIG", "2024-02-01", "5e14", "1e14");
        let lots = vec![huge, half.clone(), half];
        let mut prices = PriceMap::new();
        prices.insert(Ticker::normalize("BIG"), d("1e15"));

        let aggs = aggregate(&lots, &prices, now());
        assert_eq!(aggs[0].total_invested, max);
        assert_eq!(aggs[0].current_value(), max);
        assert!(aggs[0].xirr.is_finite());
        assert!(aggs[0].gain_percent().is_finite());

        let stats = portfolio_stats(&aggs, &lots, now());
        assert_eq!(stats.total_invested, max);
        assert_eq!(stats.total_gain, Decimal::zero());
        assert!(stats.portfolio_xirr.is_finite());
    }
}
