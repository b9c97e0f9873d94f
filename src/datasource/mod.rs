//! External providers for live quotes and portfolio commentary.

use crate::domain::{Analysis, Decimal, MarketQuote, Ticker};
use crate::engine::HoldingAggregate;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub mod http;
pub mod mock;

pub use http::HttpMarketDataSource;
pub use mock::MockDataSource;

/// Source of live prices and valuation multiples.
///
/// Implementations handle retry and backoff themselves; a returned error is final.
#[async_trait]
pub trait MarketDataProvider: Send + Sync + fmt::Debug {
    /// Fetch quotes for `tickers`. Tickers the provider does not know are
    /// simply absent from the result.
    async fn fetch_quotes(
        &self,
        tickers: &[Ticker],
    ) -> Result<HashMap<Ticker, MarketQuote>, DataSourceError>;
}

/// Source of narrative commentary over a holdings snapshot.
#[async_trait]
pub trait AnalysisProvider: Send + Sync + fmt::Debug {
    async fn analyze(&self, snapshot: &[AnalysisRow]) -> Result<Analysis, DataSourceError>;
}

/// One holding as sent to the analysis provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRow {
    pub ticker: Ticker,
    pub avg_pe: Decimal,
    pub avg_pb: Decimal,
    pub avg_buy_price: Decimal,
    pub current_price: Decimal,
    pub gain_percent: f64,
    pub shares: Decimal,
}

impl From<&HoldingAggregate> for AnalysisRow {
    fn from(h: &HoldingAggregate) -> Self {
        Self {
            ticker: h.ticker.clone(),
            avg_pe: h.avg_pe,
            avg_pb: h.avg_pb,
            avg_buy_price: h.weighted_avg_price,
            current_price: h.current_price,
            gain_percent: h.gain_percent(),
            shares: h.total_quantity,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataSourceError {
    /// Connection failure, timeout, DNS.
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("HTTP error {status}: {message}")]
    HttpError { status: u16, message: String },
    /// Response body was not the expected JSON.
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Error: {0}")]
    Other(String),
}
