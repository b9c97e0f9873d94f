//! Threshold alerts over a holding's price and average entry ratios.

use crate::domain::{AlertId, Ticker};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Comparison an alert watches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    PriceAbove,
    PriceBelow,
    PeAbove,
    PeBelow,
    PbAbove,
    PbBelow,
    EpsAbove,
    EpsBelow,
}

/// Which value of a holding an alert kind reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSubject {
    Price,
    AvgPe,
    AvgPb,
    AvgEps,
}

impl AlertKind {
    pub fn subject(&self) -> AlertSubject {
        match self {
            AlertKind::PriceAbove | AlertKind::PriceBelow => AlertSubject::Price,
            AlertKind::PeAbove | AlertKind::PeBelow => AlertSubject::AvgPe,
            AlertKind::PbAbove | AlertKind::PbBelow => AlertSubject::AvgPb,
            AlertKind::EpsAbove | AlertKind::EpsBelow => AlertSubject::AvgEps,
        }
    }

    pub fn is_above(&self) -> bool {
        matches!(
            self,
            AlertKind::PriceAbove | AlertKind::PeAbove | AlertKind::PbAbove | AlertKind::EpsAbove
        )
    }

    /// Inclusive threshold test: `>=` for ABOVE kinds, `<=` for BELOW kinds.
    pub fn is_breached(&self, observed: f64, threshold: f64) -> bool {
        if self.is_above() {
            observed >= threshold
        } else {
            observed <= threshold
        }
    }

    /// Human label, e.g. "price above".
    pub fn label(&self) -> &'static str {
        match self {
            AlertKind::PriceAbove => "price above",
            AlertKind::PriceBelow => "price below",
            AlertKind::PeAbove => "pe above",
            AlertKind::PeBelow => "pe below",
            AlertKind::PbAbove => "pb above",
            AlertKind::PbBelow => "pb below",
            AlertKind::EpsAbove => "eps above",
            AlertKind::EpsBelow => "eps below",
        }
    }
}

/// A standing watch condition on one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: AlertId,
    pub ticker: Ticker,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub threshold: f64,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// New alerts start active and untriggered.
    pub fn new(ticker: Ticker, kind: AlertKind, threshold: f64) -> Self {
        Self {
            id: AlertId::generate(),
            ticker,
            kind,
            threshold,
            is_active: true,
            triggered_at: None,
        }
    }

    /// Deactivate and stamp. Returns false if the alert had already fired.
    pub fn trigger(&mut self, at: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_active = false;
        self.triggered_at = Some(at);
        true
    }

    pub fn describe(&self) -> String {
        format!("Alert: {} {} {}", self.ticker, self.kind.label(), self.threshold)
    }
}
