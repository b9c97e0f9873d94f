pub mod alerts;
pub mod analysis;
pub mod backup;
pub mod health;
pub mod holdings;
pub mod import;
pub mod lots;
pub mod market;
pub mod screen;

use crate::error::AppError;
use crate::orchestration::PortfolioService;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PortfolioService>,
}

impl AppState {
    pub fn new(service: Arc<PortfolioService>) -> Self {
        Self { service }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/lots", get(lots::list_lots).post(lots::create_lot))
        .route("/v1/lots/:id", put(lots::update_lot).delete(lots::delete_lot))
        .route("/v1/holdings", get(holdings::get_holdings))
        .route("/v1/portfolio", get(holdings::get_portfolio))
        .route("/v1/prices/:ticker", put(market::put_price))
        .route("/v1/metrics/:ticker", put(market::put_metrics))
        .route("/v1/market/sync", post(market::sync_market))
        .route("/v1/alerts", get(alerts::list_alerts).post(alerts::create_alert))
        .route("/v1/alerts/:id", axum::routing::delete(alerts::delete_alert))
        .route("/v1/screen", get(screen::get_screen))
        .route("/v1/import", post(import::post_import))
        .route("/v1/analysis", post(analysis::post_analysis))
        .route("/v1/backup", post(backup::post_backup))
        .layer(cors)
        .with_state(state)
}

/// Parse a path identifier, reporting `what` on failure.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid {} id", what)))
}
