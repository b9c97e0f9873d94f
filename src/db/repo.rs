//! Key-value persistence of the ledger collections.
//!
//! Each collection is one JSON blob under a fixed key. Blobs carry no schema
//! version; anything that fails to decode is logged and read as empty.

use crate::domain::{Alert, MetricsMap, PriceMap, PurchaseLot};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::{debug, warn};

pub const LOTS_KEY: &str = "equity_purchases_v2";
pub const PRICES_KEY: &str = "equity_prices";
pub const METRICS_KEY: &str = "equity_metrics";
pub const ALERTS_KEY: &str = "equity_alerts";

#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Raw blob under `key`. `None` when absent or not valid JSON.
    pub async fn load(&self, key: &str) -> Result<Option<serde_json::Value>, sqlx::Error> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let text: String = row.get("value");
        match serde_json::from_str(&text) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Discarding malformed blob under {}: {}", key, e);
                Ok(None)
            }
        }
    }

    /// Insert or replace the blob under `key`.
    pub async fn save(&self, key: &str, value: &serde_json::Value) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value.to_string())
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        debug!("Saved {}", key);
        Ok(())
    }

    async fn load_typed<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, sqlx::Error> {
        let Some(value) = self.load(key).await? else {
            return Ok(T::default());
        };
        match serde_json::from_value(value) {
            Ok(decoded) => Ok(decoded),
            Err(e) => {
                warn!("Blob under {} has unexpected shape, reading as empty: {}", key, e);
                Ok(T::default())
            }
        }
    }

    async fn save_typed<T: Serialize>(&self, key: &str, data: &T) -> Result<(), sqlx::Error> {
        let value =
            serde_json::to_value(data).map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
        self.save(key, &value).await
    }

    pub async fn load_lots(&self) -> Result<Vec<PurchaseLot>, sqlx::Error> {
        self.load_typed(LOTS_KEY).await
    }

    pub async fn save_lots(&self, lots: &[PurchaseLot]) -> Result<(), sqlx::Error> {
        self.save_typed(LOTS_KEY, &lots).await
    }

    pub async fn load_prices(&self) -> Result<PriceMap, sqlx::Error> {
        self.load_typed(PRICES_KEY).await
    }

    pub async fn save_prices(&self, prices: &PriceMap) -> Result<(), sqlx::Error> {
        self.save_typed(PRICES_KEY, prices).await
    }

    pub async fn load_metrics(&self) -> Result<MetricsMap, sqlx::Error> {
        self.load_typed(METRICS_KEY).await
    }

    pub async fn save_metrics(&self, metrics: &MetricsMap) -> Result<(), sqlx::Error> {
        self.save_typed(METRICS_KEY, metrics).await
    }

    pub async fn load_alerts(&self) -> Result<Vec<Alert>, sqlx::Error> {
        self.load_typed(ALERTS_KEY).await
    }

    pub async fn save_alerts(&self, alerts: &[Alert]) -> Result<(), sqlx::Error> {
        self.save_typed(ALERTS_KEY, &alerts).await
    }
}
