//! Remote snapshot of the full ledger state.
//!
//! The payload mirrors the stored blobs so a backup can be restored by writing
//! each field back under its storage key.

use crate::domain::{Alert, MetricsMap, PriceMap, PurchaseLot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const CHECKSUM_HEADER: &str = "X-Content-SHA256";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupPayload {
    pub purchases: Vec<PurchaseLot>,
    pub current_prices: PriceMap,
    pub current_metrics: MetricsMap,
    pub alerts: Vec<Alert>,
    pub timestamp: DateTime<Utc>,
}

impl BackupPayload {
    pub fn to_body(&self) -> Result<Vec<u8>, BackupError> {
        serde_json::to_vec_pretty(self).map_err(|e| BackupError::Serialize(e.to_string()))
    }
}

/// Proof of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupReceipt {
    /// Hex SHA-256 of the uploaded body.
    pub checksum: String,
    pub bytes: usize,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackupError {
    #[error("backup destination is not configured")]
    NotConfigured,
    #[error("failed to serialize backup: {0}")]
    Serialize(String),
    #[error("backup upload failed: {0}")]
    Network(String),
    #[error("backup rejected with HTTP {status}")]
    Rejected { status: u16 },
}

pub fn checksum(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

#[async_trait]
pub trait BackupSink: Send + Sync + fmt::Debug {
    async fn upload(&self, payload: &BackupPayload) -> Result<BackupReceipt, BackupError>;
}

/// Uploads the pretty-printed payload with a single authenticated PUT.
#[derive(Debug, Clone)]
pub struct HttpBackupSink {
    client: Client,
    url: String,
    token: Option<String>,
}

impl HttpBackupSink {
    pub fn new(url: String, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url,
            token,
        }
    }
}

#[async_trait]
impl BackupSink for HttpBackupSink {
    async fn upload(&self, payload: &BackupPayload) -> Result<BackupReceipt, BackupError> {
        let body = payload.to_body()?;
        let sum = checksum(&body);
        let bytes = body.len();
        debug!("Uploading backup ({} bytes, sha256 {})", bytes, sum);

        let mut request = self
            .client
            .put(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(CHECKSUM_HEADER, &sum)
            .body(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BackupError::Network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackupError::Rejected {
                status: status.as_u16(),
            });
        }

        info!("Backup uploaded ({} bytes)", bytes);
        Ok(BackupReceipt {
            checksum: sum,
            bytes,
            uploaded_at: Utc::now(),
        })
    }
}

/// Keeps uploaded bodies in memory.
#[derive(Debug, Default)]
pub struct MemoryBackupSink {
    uploads: Mutex<Vec<Vec<u8>>>,
}

impl MemoryBackupSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn uploads(&self) -> Vec<Vec<u8>> {
        self.uploads.lock().await.clone()
    }
}

#[async_trait]
impl BackupSink for MemoryBackupSink {
    async fn upload(&self, payload: &BackupPayload) -> Result<BackupReceipt, BackupError> {
        let body = payload.to_body()?;
        let receipt = BackupReceipt {
            checksum: checksum(&body),
            bytes: body.len(),
            uploaded_at: Utc::now(),
        };
        self.uploads.lock().await.push(body);
        Ok(receipt)
    }
}
