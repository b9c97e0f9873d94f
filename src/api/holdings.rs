use crate::api::AppState;
use crate::domain::TimeMs;
use crate::error::AppError;
use crate::orchestration::{HoldingsReport, PortfolioSummary};
use axum::extract::State;
use axum::Json;

/// Aggregated holdings. Alerts are evaluated on every call.
pub async fn get_holdings(State(state): State<AppState>) -> Result<Json<HoldingsReport>, AppError> {
    Ok(Json(state.service.holdings(TimeMs::now()).await?))
}

pub async fn get_portfolio(State(state): State<AppState>) -> Json<PortfolioSummary> {
    Json(state.service.portfolio(TimeMs::now()).await)
}
