//! Domain primitives: TimeMs, Ticker, LotId, AlertId.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MS_PER_DAY: i64 = 86_400_000;

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Wall-clock time. Only the service layer reads this; the engine takes `now` as input.
    pub fn now() -> Self {
        TimeMs(Utc::now().timestamp_millis())
    }

    /// UTC midnight of the given calendar date.
    pub fn from_date(date: NaiveDate) -> Self {
        let days = date
            .signed_duration_since(NaiveDate::default())
            .num_days();
        TimeMs(days * MS_PER_DAY)
    }

    pub fn as_ms(&self) -> i64 {
        self.0
    }

    /// Fractional days elapsed since `origin` (negative when `self` is earlier).
    pub fn days_since(&self, origin: TimeMs) -> f64 {
        (self.0 - origin.0) as f64 / MS_PER_DAY as f64
    }

    /// Calendar date (UTC) of this instant.
    pub fn date(&self) -> NaiveDate {
        chrono::DateTime::from_timestamp_millis(self.0)
            .map(|dt| dt.date_naive())
            .unwrap_or_default()
    }
}

/// Ticker symbol, always trimmed and upper-cased.
///
/// Deserialization normalizes, so `"abc "` and `"ABC"` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    pub fn normalize(raw: &str) -> Self {
        Ticker(raw.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Ticker {
    fn from(raw: String) -> Self {
        Ticker::normalize(&raw)
    }
}

impl From<&str> for Ticker {
    fn from(raw: &str) -> Self {
        Ticker::normalize(raw)
    }
}

impl From<Ticker> for String {
    fn from(t: Ticker) -> Self {
        t.0
    }
}

impl std::fmt::Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identity of a purchase lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LotId(pub Uuid);

impl LotId {
    pub fn generate() -> Self {
        LotId(Uuid::new_v4())
    }
}

impl std::fmt::Display for LotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identity of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(pub Uuid);

impl AlertId {
    pub fn generate() -> Self {
        AlertId(Uuid::new_v4())
    }
}

impl std::fmt::Display for AlertId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
