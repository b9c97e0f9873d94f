use crate::api::AppState;
use axum::extract::State;
use axum::Json;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Ready once the ledger has been loaded from storage.
pub async fn ready(State(state): State<AppState>) -> Json<serde_json::Value> {
    let lots = state.service.list_lots().await.len();
    Json(serde_json::json!({"status": "ready", "lots": lots}))
}
