use crate::api::AppState;
use crate::error::AppError;
use crate::import::{ImportReport, XLSX_CONTENT_TYPE};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;

/// Body is either an `.xlsx` workbook (by content type) or the raw export
/// text. Imported lots are dated today (UTC).
pub async fn post_import(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ImportReport>, AppError> {
    let today = Utc::now().date_naive();
    let is_workbook = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with(XLSX_CONTENT_TYPE));

    let report = if is_workbook {
        state.service.import_spreadsheet(&body, today).await?
    } else {
        let text = std::str::from_utf8(&body)
            .map_err(|_| AppError::BadRequest("import body must be UTF-8 text".to_string()))?;
        state.service.import(text, today).await?
    };
    Ok(Json(report))
}
