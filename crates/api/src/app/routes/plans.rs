use axum::{http::StatusCode, response::IntoResponse, Json};

use jobboard_plans::all_plans;

use crate::app::dto;

pub async fn list_plans() -> axum::response::Response {
    let items = all_plans().iter().map(dto::plan_to_json).collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
