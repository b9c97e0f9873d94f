use crate::api::AppState;
use crate::domain::TimeMs;
use crate::engine::{ScreenMetric, ScreenSide, ValuationGap};
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ScreenQuery {
    pub side: ScreenSide,
    #[serde(default)]
    pub metric: ScreenMetric,
}

#[derive(Debug, Serialize)]
pub struct ScreenResponse {
    pub side: ScreenSide,
    pub metric: ScreenMetric,
    pub rows: Vec<ValuationGap>,
}

pub async fn get_screen(
    Query(params): Query<ScreenQuery>,
    State(state): State<AppState>,
) -> Json<ScreenResponse> {
    let rows = state
        .service
        .screen(TimeMs::now(), params.side, params.metric)
        .await;
    Json(ScreenResponse {
        side: params.side,
        metric: params.metric,
        rows,
    })
}
