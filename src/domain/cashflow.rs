//! Dated, signed cash flow fed to the return solver.

use crate::domain::TimeMs;
use serde::{Deserialize, Serialize};

/// Negative amounts are money paid in (purchases), positive amounts money received.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashFlow {
    pub amount: f64,
    pub time_ms: TimeMs,
}

impl CashFlow {
    pub fn new(amount: f64, time_ms: TimeMs) -> Self {
        Self { amount, time_ms }
    }
}

/// Stable ascending sort by time; equal timestamps keep their input order.
pub fn sort_by_time(flows: &mut [CashFlow]) {
    flows.sort_by_key(|f| f.time_ms);
}
