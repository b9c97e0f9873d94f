use crate::api::AppState;
use crate::backup::BackupReceipt;
use crate::error::AppError;
use axum::extract::State;
use axum::Json;

pub async fn post_backup(State(state): State<AppState>) -> Result<Json<BackupReceipt>, AppError> {
    Ok(Json(state.service.backup().await?))
}
