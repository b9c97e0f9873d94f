//! Domain types for the investment ledger.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Primitives: TimeMs, Ticker, LotId, AlertId
//! - Purchase lots and alerts with their stored JSON shape
//! - Cash flows and market-side inputs consumed by the engine

pub mod alert;
pub mod cashflow;
pub mod decimal;
pub mod lot;
pub mod market;
pub mod primitives;

pub use alert::{Alert, AlertKind, AlertSubject};
pub use cashflow::CashFlow;
pub use decimal::Decimal;
pub use lot::{LotDraft, LotValidationError, PurchaseLot};
pub use market::{Analysis, LiveMetrics, MarketQuote, MetricsMap, PriceMap};
pub use primitives::{AlertId, LotId, Ticker, TimeMs};
