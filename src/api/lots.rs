use crate::api::{parse_id, AppState};
use crate::domain::{LotDraft, LotId, PurchaseLot};
use crate::error::AppError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

pub async fn list_lots(State(state): State<AppState>) -> Json<Vec<PurchaseLot>> {
    Json(state.service.list_lots().await)
}

pub async fn create_lot(
    State(state): State<AppState>,
    Json(draft): Json<LotDraft>,
) -> Result<(StatusCode, Json<PurchaseLot>), AppError> {
    let lot = state.service.add_lot(draft).await?;
    Ok((StatusCode::CREATED, Json(lot)))
}

pub async fn update_lot(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<LotDraft>,
) -> Result<Json<PurchaseLot>, AppError> {
    let id = LotId(parse_id(&id, "lot")?);
    Ok(Json(state.service.update_lot(id, draft).await?))
}

pub async fn delete_lot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = LotId(parse_id(&id, "lot")?);
    state.service.remove_lot(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
