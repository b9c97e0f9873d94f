use crate::api::AppState;
use crate::domain::{Analysis, TimeMs};
use axum::extract::State;
use axum::Json;

pub async fn post_analysis(State(state): State<AppState>) -> Json<Analysis> {
    Json(state.service.analysis(TimeMs::now()).await)
}
