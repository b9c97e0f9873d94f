//! Ledger service: owns the mutable collections, persists them, and serves
//! derived views through the holdings cache.

use crate::backup::{BackupError, BackupPayload, BackupReceipt, BackupSink};
use crate::datasource::{AnalysisProvider, AnalysisRow, MarketDataProvider};
use crate::db::Repository;
use crate::domain::{
    Alert, AlertId, AlertKind, Analysis, Decimal, LiveMetrics, LotDraft, LotId,
    LotValidationError, MetricsMap, PriceMap, PurchaseLot, Ticker, TimeMs,
};
use crate::engine::{
    check_alerts, screen, HoldingAggregate, HoldingsCache, HoldingsView, PortfolioStats,
    ScreenMetric, ScreenSide, TriggeredAlert, ValuationGap,
};
use crate::import::{parse_holdings, parse_holdings_xlsx, ImportError, ImportReport};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    InvalidLot(#[from] LotValidationError),
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Backup(#[from] BackupError),
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

/// Request body for a new alert.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDraft {
    pub ticker: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingsReport {
    pub holdings: Vec<HoldingAggregate>,
    pub triggered: Vec<TriggeredAlert>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    #[serde(flatten)]
    pub stats: PortfolioStats,
    pub holdings_count: usize,
    pub active_alerts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub requested: usize,
    pub updated: usize,
}

#[derive(Debug, Default)]
struct LedgerState {
    lots: Vec<PurchaseLot>,
    prices: PriceMap,
    metrics: MetricsMap,
    alerts: Vec<Alert>,
    /// Bumped on every change to lots or prices.
    version: u64,
}

impl LedgerState {
    fn tickers(&self) -> Vec<Ticker> {
        self.lots
            .iter()
            .map(|l| l.ticker.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Copy of the price map with a seed entry for each ticker that has no
    /// usable price yet.
    fn seeded_prices<'a>(&self, lots: impl IntoIterator<Item = &'a PurchaseLot>) -> Option<PriceMap> {
        let mut prices = self.prices.clone();
        let mut changed = false;
        for lot in lots {
            let known = prices.get(&lot.ticker).is_some_and(|p| !p.is_zero());
            if !known {
                prices.insert(lot.ticker.clone(), lot.price);
                changed = true;
            }
        }
        changed.then_some(prices)
    }
}

pub struct PortfolioService {
    repo: Arc<Repository>,
    market: Arc<dyn MarketDataProvider>,
    analyst: Arc<dyn AnalysisProvider>,
    backup: Option<Arc<dyn BackupSink>>,
    state: RwLock<LedgerState>,
    cache: Mutex<HoldingsCache>,
}

impl PortfolioService {
    /// Restore persisted collections and wire up providers.
    pub async fn load(
        repo: Arc<Repository>,
        market: Arc<dyn MarketDataProvider>,
        analyst: Arc<dyn AnalysisProvider>,
        backup: Option<Arc<dyn BackupSink>>,
    ) -> Result<Self, ServiceError> {
        let state = LedgerState {
            lots: repo.load_lots().await?,
            prices: repo.load_prices().await?,
            metrics: repo.load_metrics().await?,
            alerts: repo.load_alerts().await?,
            version: 0,
        };
        info!(
            "Loaded {} lots, {} prices, {} alerts",
            state.lots.len(),
            state.prices.len(),
            state.alerts.len()
        );

        Ok(Self {
            repo,
            market,
            analyst,
            backup,
            state: RwLock::new(state),
            cache: Mutex::new(HoldingsCache::new()),
        })
    }

    // =========================================================================
    // Lots
    // =========================================================================

    pub async fn list_lots(&self) -> Vec<PurchaseLot> {
        self.state.read().await.lots.clone()
    }

    /// Record a purchase. Seeds the ticker's current price with the lot price
    /// when no price is known yet.
    pub async fn add_lot(&self, draft: LotDraft) -> Result<PurchaseLot, ServiceError> {
        let lot = draft.into_lot()?;
        let mut state = self.state.write().await;

        let mut lots = state.lots.clone();
        lots.push(lot.clone());
        let seeded = state.seeded_prices([&lot]);

        self.repo.save_lots(&lots).await?;
        if let Some(prices) = &seeded {
            self.repo.save_prices(prices).await?;
        }

        state.lots = lots;
        if let Some(prices) = seeded {
            state.prices = prices;
        }
        state.version += 1;
        info!("Added lot {} for {}", lot.id, lot.ticker);
        Ok(lot)
    }

    pub async fn update_lot(&self, id: LotId, draft: LotDraft) -> Result<PurchaseLot, ServiceError> {
        let lot = draft.into_lot_with_id(id)?;
        let mut state = self.state.write().await;

        let mut lots = state.lots.clone();
        let slot = lots
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("lot {}", id)))?;
        *slot = lot.clone();

        self.repo.save_lots(&lots).await?;
        state.lots = lots;
        state.version += 1;
        debug!("Updated lot {}", id);
        Ok(lot)
    }

    pub async fn remove_lot(&self, id: LotId) -> Result<(), ServiceError> {
        let mut state = self.state.write().await;

        let mut lots = state.lots.clone();
        let before = lots.len();
        lots.retain(|l| l.id != id);
        if lots.len() == before {
            return Err(ServiceError::NotFound(format!("lot {}", id)));
        }

        self.repo.save_lots(&lots).await?;
        state.lots = lots;
        state.version += 1;
        debug!("Removed lot {}", id);
        Ok(())
    }

    /// Append every accepted row of a delimited broker export as a new lot.
    pub async fn import(&self, text: &str, today: NaiveDate) -> Result<ImportReport, ServiceError> {
        let report = parse_holdings(text, today)?;
        self.append_imported(report).await
    }

    /// Same as `import`, reading the first worksheet of an `.xlsx` workbook.
    pub async fn import_spreadsheet(
        &self,
        bytes: &[u8],
        today: NaiveDate,
    ) -> Result<ImportReport, ServiceError> {
        let report = parse_holdings_xlsx(bytes, today)?;
        self.append_imported(report).await
    }

    async fn append_imported(&self, report: ImportReport) -> Result<ImportReport, ServiceError> {
        let mut state = self.state.write().await;

        let mut lots = state.lots.clone();
        lots.extend(report.lots.iter().cloned());
        let seeded = state.seeded_prices(&report.lots);

        self.repo.save_lots(&lots).await?;
        if let Some(prices) = &seeded {
            self.repo.save_prices(prices).await?;
        }

        state.lots = lots;
        if let Some(prices) = seeded {
            state.prices = prices;
        }
        state.version += 1;
        Ok(report)
    }

    // =========================================================================
    // Prices and metrics
    // =========================================================================

    pub async fn set_price(&self, ticker: &str, price: Decimal) -> Result<(), ServiceError> {
        let ticker = non_empty_ticker(ticker)?;
        if price.is_negative() {
            return Err(ServiceError::InvalidInput(format!(
                "price must not be negative, got {}",
                price
            )));
        }

        let mut state = self.state.write().await;
        let mut prices = state.prices.clone();
        prices.insert(ticker, price);

        self.repo.save_prices(&prices).await?;
        state.prices = prices;
        state.version += 1;
        Ok(())
    }

    /// Overlay manually entered live multiples; absent fields are kept.
    pub async fn set_metrics(
        &self,
        ticker: &str,
        update: LiveMetrics,
    ) -> Result<LiveMetrics, ServiceError> {
        let ticker = non_empty_ticker(ticker)?;
        let mut state = self.state.write().await;

        let mut metrics = state.metrics.clone();
        let entry = metrics.entry(ticker).or_default();
        entry.merge(update);
        let merged = *entry;

        self.repo.save_metrics(&metrics).await?;
        state.metrics = metrics;
        Ok(merged)
    }

    /// Refresh prices and multiples for every held ticker. Provider failures
    /// keep existing values and report zero updates.
    pub async fn sync_market(&self) -> Result<SyncReport, ServiceError> {
        let tickers = self.state.read().await.tickers();
        if tickers.is_empty() {
            return Ok(SyncReport {
                requested: 0,
                updated: 0,
            });
        }

        let quotes = match self.market.fetch_quotes(&tickers).await {
            Ok(quotes) => quotes,
            Err(e) => {
                warn!("Market sync failed, keeping existing prices: {}", e);
                return Ok(SyncReport {
                    requested: tickers.len(),
                    updated: 0,
                });
            }
        };

        let mut state = self.state.write().await;
        let mut prices = state.prices.clone();
        let mut metrics = state.metrics.clone();
        for (ticker, quote) in &quotes {
            prices.insert(ticker.clone(), quote.price);
            metrics.entry(ticker.clone()).or_default().merge(quote.metrics());
        }

        self.repo.save_prices(&prices).await?;
        self.repo.save_metrics(&metrics).await?;
        state.prices = prices;
        state.metrics = metrics;
        state.version += 1;

        info!("Market sync updated {}/{} tickers", quotes.len(), tickers.len());
        Ok(SyncReport {
            requested: tickers.len(),
            updated: quotes.len(),
        })
    }

    pub async fn metrics(&self) -> MetricsMap {
        self.state.read().await.metrics.clone()
    }

    // =========================================================================
    // Derived views
    // =========================================================================

    /// Number of times the holdings view has been recomputed since load.
    pub async fn holdings_recomputations(&self) -> u64 {
        self.cache.lock().await.recomputations()
    }

    async fn view(&self, state: &LedgerState, now: TimeMs) -> Arc<HoldingsView> {
        self.cache
            .lock()
            .await
            .get_or_compute(state.version, now, &state.lots, &state.prices)
    }

    /// Current holdings. Runs the alert check against them and persists any
    /// alerts that fired.
    pub async fn holdings(&self, now: TimeMs) -> Result<HoldingsReport, ServiceError> {
        let mut state = self.state.write().await;
        let view = self.view(&state, now).await;

        let at = DateTime::<Utc>::from_timestamp_millis(now.as_ms()).unwrap_or_else(Utc::now);
        let mut alerts = state.alerts.clone();
        let triggered = check_alerts(&mut alerts, &view.holdings, at);
        if !triggered.is_empty() {
            self.repo.save_alerts(&alerts).await?;
            state.alerts = alerts;
            for t in &triggered {
                info!("{} (observed {})", t.message, t.observed);
            }
        }

        Ok(HoldingsReport {
            holdings: view.holdings.clone(),
            triggered,
        })
    }

    pub async fn portfolio(&self, now: TimeMs) -> PortfolioSummary {
        let state = self.state.read().await;
        let view = self.view(&state, now).await;
        PortfolioSummary {
            stats: view.stats.clone(),
            holdings_count: view.holdings.len(),
            active_alerts: state.alerts.iter().filter(|a| a.is_active).count(),
        }
    }

    pub async fn screen(&self, now: TimeMs, side: ScreenSide, metric: ScreenMetric) -> Vec<ValuationGap> {
        let state = self.state.read().await;
        let view = self.view(&state, now).await;
        screen(&view.holdings, &state.metrics, side, metric)
    }

    /// Narrative commentary over current holdings, or the fallback text when
    /// there is nothing to analyze or the provider fails.
    pub async fn analysis(&self, now: TimeMs) -> Analysis {
        let rows: Vec<AnalysisRow> = {
            let state = self.state.read().await;
            let view = self.view(&state, now).await;
            view.holdings.iter().map(AnalysisRow::from).collect()
        };
        if rows.is_empty() {
            return Analysis::unavailable();
        }

        match self.analyst.analyze(&rows).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("Analysis provider failed: {}", e);
                Analysis::unavailable()
            }
        }
    }

    // =========================================================================
    // Alerts
    // =========================================================================

    pub async fn list_alerts(&self, ticker: Option<&str>) -> Vec<Alert> {
        let filter = ticker.map(Ticker::normalize);
        self.state
            .read()
            .await
            .alerts
            .iter()
            .filter(|a| filter.as_ref().map_or(true, |t| &a.ticker == t))
            .cloned()
            .collect()
    }

    pub async fn add_alert(&self, draft: AlertDraft) -> Result<Alert, ServiceError> {
        let ticker = non_empty_ticker(&draft.ticker)?;
        if !draft.threshold.is_finite() {
            return Err(ServiceError::InvalidInput(
                "threshold must be a finite number".to_string(),
            ));
        }

        let alert = Alert::new(ticker, draft.kind, draft.threshold);
        let mut state = self.state.write().await;
        let mut alerts = state.alerts.clone();
        alerts.push(alert.clone());

        self.repo.save_alerts(&alerts).await?;
        state.alerts = alerts;
        info!("Added alert {}", alert.describe());
        Ok(alert)
    }

    pub async fn delete_alert(&self, id: AlertId) -> Result<(), ServiceError> {
        let mut state = self.state.write().await;
        let mut alerts = state.alerts.clone();
        let before = alerts.len();
        alerts.retain(|a| a.id != id);
        if alerts.len() == before {
            return Err(ServiceError::NotFound(format!("alert {}", id)));
        }

        self.repo.save_alerts(&alerts).await?;
        state.alerts = alerts;
        Ok(())
    }

    // =========================================================================
    // Backup
    // =========================================================================

    pub async fn backup(&self) -> Result<BackupReceipt, ServiceError> {
        let sink = self.backup.as_ref().ok_or(BackupError::NotConfigured)?;
        let payload = {
            let state = self.state.read().await;
            BackupPayload {
                purchases: state.lots.clone(),
                current_prices: state.prices.clone(),
                current_metrics: state.metrics.clone(),
                alerts: state.alerts.clone(),
                timestamp: Utc::now(),
            }
        };
        Ok(sink.upload(&payload).await?)
    }
}

fn non_empty_ticker(raw: &str) -> Result<Ticker, ServiceError> {
    let ticker = Ticker::normalize(raw);
    if ticker.is_empty() {
        return Err(ServiceError::InvalidInput("ticker must not be empty".to_string()));
    }
    Ok(ticker)
}
