use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::AppState;
use crate::routes::json_error;

/// Drops every cached design. There is no eviction policy, so this is the
/// only way entries ever leave the cache.
pub async fn clear_cache(State(state): State<Arc<AppState>>) -> Response {
    match state.cache.clear().await {
        Ok(cleared) => Json(json!({"success": true, "cleared": cleared})).into_response(),
        Err(err) => {
            tracing::error!(%err, "failed to clear design cache");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to clear cache")
        }
    }
}
