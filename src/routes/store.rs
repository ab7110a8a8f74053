use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::routes::json_error;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToStoreRequest {
    pub design_id: Option<String>,
    pub image_url: Option<String>,
    pub title: Option<String>,
}

/// Adds a design to the store catalog. The real sync-product call is not
/// wired up, so both branches return a synthetic product; only the message
/// tells the operator whether a key is present.
pub async fn add_to_store(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddToStoreRequest>,
) -> Response {
    let (Some(design_id), Some(_image_url), Some(title)) =
        (request.design_id, request.image_url, request.title)
    else {
        return json_error(StatusCode::BAD_REQUEST, "Missing required fields");
    };

    let product_id = format!("product-{}", Utc::now().timestamp_millis());

    if state.config.printful_api_key.is_none() {
        tracing::info!(
            %design_id,
            %title,
            "Printful API key not configured; a real deployment would upload the design, \
             create a product template, and add it to the store catalog"
        );
        return Json(json!({
            "success": true,
            "message": "Design would be added to store (Printful API key needed)",
            "productId": product_id,
            "storeUrl": "#",
        }))
        .into_response();
    }

    tracing::info!(%design_id, %title, "design added to store");
    Json(json!({
        "success": true,
        "message": "Design added to store successfully",
        "productId": product_id,
        "storeUrl": "#",
    }))
    .into_response()
}
