use axum::{Json, response::{IntoResponse, Response}};
use serde_json::json;

use crate::trending::trending_topics;

pub async fn trending() -> Response {
    let topics = trending_topics().await;
    Json(json!({
        "success": true,
        "topics": topics,
    }))
    .into_response()
}
