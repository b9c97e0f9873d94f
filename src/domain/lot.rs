//! Purchase lot: one logged buy of a ticker.

use crate::domain::{Decimal, LotId, Ticker, TimeMs};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single purchase of a ticker, with the valuation ratios observed at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseLot {
    pub id: LotId,
    /// Normalized ticker (trimmed, upper-cased).
    #[serde(rename = "name")]
    pub ticker: Ticker,
    pub purchase_date: NaiveDate,
    pub price: Decimal,
    pub quantity: Decimal,
    pub pe: Decimal,
    pub pb: Decimal,
    pub eps: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// User-supplied lot fields, before identity is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotDraft {
    #[serde(alias = "name")]
    pub ticker: String,
    pub purchase_date: NaiveDate,
    pub price: Decimal,
    pub quantity: Decimal,
    #[serde(default)]
    pub pe: Decimal,
    #[serde(default)]
    pub pb: Decimal,
    #[serde(default)]
    pub eps: Decimal,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LotValidationError {
    #[error("ticker must not be empty")]
    EmptyTicker,
    #[error("price must be positive, got {0}")]
    NonPositivePrice(Decimal),
    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(Decimal),
    #[error("price {price} x quantity {quantity} is out of range")]
    InvestedOutOfRange { price: Decimal, quantity: Decimal },
}

impl LotDraft {
    /// Validate and assign a fresh identity.
    pub fn into_lot(self) -> Result<PurchaseLot, LotValidationError> {
        self.into_lot_with_id(LotId::generate())
    }

    /// Validate and keep an existing identity (in-place edit).
    pub fn into_lot_with_id(self, id: LotId) -> Result<PurchaseLot, LotValidationError> {
        let ticker = Ticker::normalize(&self.ticker);
        if ticker.is_empty() {
            return Err(LotValidationError::EmptyTicker);
        }
        if !self.price.is_positive() {
            return Err(LotValidationError::NonPositivePrice(self.price));
        }
        if !self.quantity.is_positive() {
            return Err(LotValidationError::NonPositiveQuantity(self.quantity));
        }
        if self.price.checked_mul(self.quantity).is_none() {
            return Err(LotValidationError::InvestedOutOfRange {
                price: self.price,
                quantity: self.quantity,
            });
        }

        let note = self
            .note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        Ok(PurchaseLot {
            id,
            ticker,
            purchase_date: self.purchase_date,
            price: self.price,
            quantity: self.quantity,
            pe: self.pe,
            pb: self.pb,
            eps: self.eps,
            note,
        })
    }
}

impl PurchaseLot {
    /// Capital deployed by this lot (price × quantity). Stored lots that predate
    /// range validation saturate rather than overflow.
    pub fn invested(&self) -> Decimal {
        self.price.saturating_mul(self.quantity)
    }

    /// Instant used for this lot's cash flow: UTC midnight of the purchase date.
    pub fn purchased_at(&self) -> TimeMs {
        TimeMs::from_date(self.purchase_date)
    }
}
