use crate::api::AppState;
use crate::domain::{Decimal, LiveMetrics, Ticker};
use crate::error::AppError;
use crate::orchestration::SyncReport;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct PriceBody {
    pub price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PriceResponse {
    pub ticker: Ticker,
    pub price: Decimal,
}

pub async fn put_price(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Json(body): Json<PriceBody>,
) -> Result<Json<PriceResponse>, AppError> {
    state.service.set_price(&ticker, body.price).await?;
    Ok(Json(PriceResponse {
        ticker: Ticker::normalize(&ticker),
        price: body.price,
    }))
}

/// Partial update: omitted multiples keep their current value.
pub async fn put_metrics(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Json(update): Json<LiveMetrics>,
) -> Result<Json<LiveMetrics>, AppError> {
    Ok(Json(state.service.set_metrics(&ticker, update).await?))
}

pub async fn sync_market(State(state): State<AppState>) -> Result<Json<SyncReport>, AppError> {
    Ok(Json(state.service.sync_market().await?))
}
