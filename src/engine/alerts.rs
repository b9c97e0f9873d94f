//! Alert evaluation against freshly computed holdings.

use crate::domain::{Alert, AlertId, AlertKind, AlertSubject, Ticker};
use crate::engine::HoldingAggregate;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Notification for an alert that fired during a check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggeredAlert {
    pub alert_id: AlertId,
    pub ticker: Ticker,
    pub kind: AlertKind,
    pub threshold: f64,
    pub observed: f64,
    pub message: String,
}

/// Value of `holding` that an alert of `subject` compares against.
///
/// Ratio alerts read the average *entry* ratio, not a live multiple.
pub fn observed_value(holding: &HoldingAggregate, subject: AlertSubject) -> f64 {
    match subject {
        AlertSubject::Price => holding.current_price.to_f64(),
        AlertSubject::AvgPe => holding.avg_pe.to_f64(),
        AlertSubject::AvgPb => holding.avg_pb.to_f64(),
        AlertSubject::AvgEps => holding.avg_eps.to_f64(),
    }
}

/// Evaluate every active alert whose ticker has a holding, deactivating the
/// ones whose condition holds. Inactive alerts are never re-evaluated, so each
/// alert fires at most once.
pub fn check_alerts(
    alerts: &mut [Alert],
    holdings: &[HoldingAggregate],
    at: DateTime<Utc>,
) -> Vec<TriggeredAlert> {
    let mut fired = Vec::new();

    for holding in holdings {
        for alert in alerts
            .iter_mut()
            .filter(|a| a.is_active && a.ticker == holding.ticker)
        {
            let observed = observed_value(holding, alert.kind.subject());
            if !alert.kind.is_breached(observed, alert.threshold) {
                continue;
            }
            if alert.trigger(at) {
                fired.push(TriggeredAlert {
                    alert_id: alert.id,
                    ticker: alert.ticker.clone(),
                    kind: alert.kind,
                    threshold: alert.threshold,
                    observed,
                    message: alert.describe(),
                });
            }
        }
    }

    fired
}
