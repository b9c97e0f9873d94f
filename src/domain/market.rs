//! Market-side inputs: live quotes, live valuation multiples, narrative analysis.

use crate::domain::{Decimal, Ticker};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Current price per ticker. Missing tickers are treated as price 0.
pub type PriceMap = HashMap<Ticker, Decimal>;

/// Live valuation multiples per ticker, synced or entered manually.
pub type MetricsMap = HashMap<Ticker, LiveMetrics>;

/// One ticker's quote as returned by a market-data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pe: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pb: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eps: Option<Decimal>,
}

impl MarketQuote {
    pub fn metrics(&self) -> LiveMetrics {
        LiveMetrics {
            pe: self.pe,
            pb: self.pb,
            eps: self.eps,
        }
    }
}

/// Partial set of live multiples; absent fields are unknown, not zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pe: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pb: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eps: Option<Decimal>,
}

impl LiveMetrics {
    /// Overlay the fields present in `other`, keeping ours where `other` is silent.
    pub fn merge(&mut self, other: LiveMetrics) {
        if other.pe.is_some() {
            self.pe = other.pe;
        }
        if other.pb.is_some() {
            self.pb = other.pb;
        }
        if other.eps.is_some() {
            self.eps = other.eps;
        }
    }
}

/// Free-text portfolio commentary from the analysis provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub summary: String,
    pub advice: String,
}

impl Analysis {
    /// Text shown when the provider is unavailable.
    pub fn unavailable() -> Self {
        Self {
            summary: "Unable to generate analysis at this time.".to_string(),
            advice: "Try again after adding more data points.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_merge_overlays_present_fields() {
        let mut m = LiveMetrics {
            pe: Some(d("20")),
            pb: Some(d("3")),
            eps: None,
        };
        m.merge(LiveMetrics {
            pe: None,
            pb: Some(d("2.5")),
            eps: Some(d("12")),
        });
        assert_eq!(m.pe, Some(d("20")));
        assert_eq!(m.pb, Some(d("2.5")));
        assert_eq!(m.eps, Some(d("12")));
    }

    #[test]
    fn test_quote_deserializes_partial_record() {
        let q: MarketQuote = serde_json::from_str(r#"{"price": 1520.5, "pe": 24.1}"#).unwrap();
        assert_eq!(q.price, d("1520.5"));
        assert_eq!(q.pe, Some(d("24.1")));
        assert_eq!(q.pb, None);
    }
}
