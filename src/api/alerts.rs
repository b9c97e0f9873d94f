use crate::api::{parse_id, AppState};
use crate::domain::{Alert, AlertId};
use crate::error::AppError;
use crate::orchestration::AlertDraft;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    pub ticker: Option<String>,
}

pub async fn list_alerts(
    Query(params): Query<AlertsQuery>,
    State(state): State<AppState>,
) -> Json<Vec<Alert>> {
    Json(state.service.list_alerts(params.ticker.as_deref()).await)
}

pub async fn create_alert(
    State(state): State<AppState>,
    Json(draft): Json<AlertDraft>,
) -> Result<(StatusCode, Json<Alert>), AppError> {
    let alert = state.service.add_alert(draft).await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

pub async fn delete_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = AlertId(parse_id(&id, "alert")?);
    state.service.delete_alert(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
