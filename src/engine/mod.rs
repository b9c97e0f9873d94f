//! Pure computation engine: aggregation, return solving, alerts, screening.
//!
//! Nothing in here performs I/O or reads the clock; `now` is always an input.

pub mod aggregator;
pub mod alerts;
pub mod cache;
pub mod screen;
pub mod xirr;

pub use aggregator::{
    aggregate, holding_flows, portfolio_flows, portfolio_stats, HoldingAggregate, PortfolioStats,
    RatioMeans,
};
pub use alerts::{check_alerts, TriggeredAlert};
pub use cache::{HoldingsCache, HoldingsView};
pub use screen::{screen, ScreenMetric, ScreenSide, ValuationGap};
pub use xirr::{solve, solve_rate, Termination, XirrOutcome};
