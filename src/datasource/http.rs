//! JSON-over-HTTP market data and analysis client.

use super::{AnalysisProvider, AnalysisRow, DataSourceError, MarketDataProvider};
use crate::domain::{Analysis, Decimal, MarketQuote, Ticker};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Provider reached at `{base_url}/quotes` and `{base_url}/analysis`.
#[derive(Debug, Clone)]
pub struct HttpMarketDataSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    max_elapsed: Duration,
}

impl HttpMarketDataSource {
    pub fn new(base_url: String, api_key: Option<String>, max_elapsed: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            max_elapsed,
        }
    }

    async fn post_json(
        &self,
        path: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, DataSourceError> {
        let url = format!("{}/{}", self.base_url, path);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        retry(backoff, || async {
            let mut request = self.client.post(&url).json(&payload);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            let response = request.send().await.map_err(|e| {
                backoff::Error::transient(DataSourceError::NetworkError(e.to_string()))
            })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(DataSourceError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(DataSourceError::ParseError(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl MarketDataProvider for HttpMarketDataSource {
    async fn fetch_quotes(
        &self,
        tickers: &[Ticker],
    ) -> Result<HashMap<Ticker, MarketQuote>, DataSourceError> {
        debug!("Fetching quotes for {} tickers", tickers.len());

        let payload = serde_json::json!({ "tickers": tickers });
        let response = self.post_json("quotes", payload).await?;
        parse_quotes(&response)
    }
}

#[async_trait]
impl AnalysisProvider for HttpMarketDataSource {
    async fn analyze(&self, snapshot: &[AnalysisRow]) -> Result<Analysis, DataSourceError> {
        debug!("Requesting analysis for {} holdings", snapshot.len());

        let payload = serde_json::json!({ "holdings": snapshot });
        let response = self.post_json("analysis", payload).await?;
        serde_json::from_value(response).map_err(|e| DataSourceError::ParseError(e.to_string()))
    }
}

/// Decode a `{ticker: {price, pe?, pb?, eps?}}` object. Keys are normalized;
/// entries that fail to decode are logged and dropped.
fn parse_quotes(
    response: &serde_json::Value,
) -> Result<HashMap<Ticker, MarketQuote>, DataSourceError> {
    let entries = response
        .as_object()
        .ok_or_else(|| DataSourceError::ParseError("Expected object response".to_string()))?;

    let mut quotes = HashMap::with_capacity(entries.len());
    for (key, value) in entries {
        match parse_quote(value) {
            Ok(quote) => {
                quotes.insert(Ticker::normalize(key), quote);
            }
            Err(e) => {
                warn!("Failed to parse quote for {}: {}", key, e);
            }
        }
    }
    Ok(quotes)
}

fn parse_quote(value: &serde_json::Value) -> Result<MarketQuote, DataSourceError> {
    let price = number_field(value, "price")?
        .ok_or_else(|| DataSourceError::ParseError("Missing price field".to_string()))?;

    Ok(MarketQuote {
        price,
        pe: number_field(value, "pe")?,
        pb: number_field(value, "pb")?,
        eps: number_field(value, "eps")?,
    })
}

/// Providers send numbers either as JSON numbers or as strings.
fn number_field(
    value: &serde_json::Value,
    field: &str,
) -> Result<Option<Decimal>, DataSourceError> {
    let invalid = || DataSourceError::ParseError(format!("Invalid {}", field));
    match value.get(field) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Decimal::from_str_canonical(s)
            .map(Some)
            .map_err(|_| invalid()),
        Some(serde_json::Value::Number(n)) => n
            .as_f64()
            .and_then(Decimal::from_f64)
            .map(Some)
            .ok_or_else(invalid),
        Some(_) => Err(invalid()),
    }
}
