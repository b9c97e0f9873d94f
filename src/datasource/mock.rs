//! In-memory providers for tests and offline runs.

use super::{AnalysisProvider, AnalysisRow, DataSourceError, MarketDataProvider};
use crate::domain::{Analysis, Decimal, LiveMetrics, MarketQuote, Ticker};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Mock provider that serves predefined quotes and analysis.
#[derive(Debug, Default)]
pub struct MockDataSource {
    quotes: HashMap<Ticker, MarketQuote>,
    analysis: Option<Analysis>,
    failure: Option<DataSourceError>,
    calls: AtomicUsize,
}

impl MockDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a price-only quote for `ticker`.
    pub fn with_price(self, ticker: &str, price: Decimal) -> Self {
        self.with_quote(
            ticker,
            MarketQuote {
                price,
                pe: None,
                pb: None,
                eps: None,
            },
        )
    }

    pub fn with_quote(mut self, ticker: &str, quote: MarketQuote) -> Self {
        self.quotes.insert(Ticker::normalize(ticker), quote);
        self
    }

    /// Serve a quote carrying live multiples.
    pub fn with_metrics(self, ticker: &str, price: Decimal, metrics: LiveMetrics) -> Self {
        self.with_quote(
            ticker,
            MarketQuote {
                price,
                pe: metrics.pe,
                pb: metrics.pb,
                eps: metrics.eps,
            },
        )
    }

    pub fn with_analysis(mut self, summary: &str, advice: &str) -> Self {
        self.analysis = Some(Analysis {
            summary: summary.to_string(),
            advice: advice.to_string(),
        });
        self
    }

    /// Make every call fail with `error`.
    pub fn failing(mut self, error: DataSourceError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Number of provider calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record_call(&self) -> Result<(), DataSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MarketDataProvider for MockDataSource {
    async fn fetch_quotes(
        &self,
        tickers: &[Ticker],
    ) -> Result<HashMap<Ticker, MarketQuote>, DataSourceError> {
        self.record_call()?;
        Ok(tickers
            .iter()
            .filter_map(|t| self.quotes.get(t).map(|q| (t.clone(), *q)))
            .collect())
    }
}

#[async_trait]
impl AnalysisProvider for MockDataSource {
    async fn analyze(&self, _snapshot: &[AnalysisRow]) -> Result<Analysis, DataSourceError> {
        self.record_call()?;
        self.analysis
            .clone()
            .ok_or_else(|| DataSourceError::Other("no analysis configured".to_string()))
    }
}
