pub mod cache_admin;
pub mod checkout;
pub mod design;
pub mod payment;
pub mod store;
pub mod trending;
pub mod upload;
pub mod webhook;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub(crate) fn json_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/trending", get(trending::trending))
        .route("/api/generate-design", post(design::generate_design))
        .route("/api/add-to-store", post(store::add_to_store))
        .route("/api/create-checkout", post(checkout::create_checkout))
        .route("/api/create-order", post(checkout::create_order))
        .route("/api/create-payment", post(payment::create_payment))
        .route(
            "/api/create-payment-intent",
            post(payment::create_payment_intent),
        )
        .route("/api/fulfill-order", post(payment::fulfill_order))
        .route("/api/verify-payment", post(payment::verify_payment))
        .route("/api/upload-image", post(upload::upload_image))
        .route("/api/webhooks/stripe", post(webhook::stripe_webhook))
        .route("/api/cache/clear", post(cache_admin::clear_cache))
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use serde_json::Value;
    use tempfile::TempDir;

    use crate::cache::DesignCache;
    use crate::config::Config;
    use crate::fulfillment::FulfillmentLedger;
    use crate::AppState;

    pub fn state_with(config: Config) -> (TempDir, Arc<AppState>) {
        let dir = TempDir::new().unwrap();
        let state = AppState {
            config,
            cache: DesignCache::new(dir.path().join("designs")),
            ledger: FulfillmentLedger::new(dir.path().join("fulfillments")),
        };
        (dir, Arc::new(state))
    }

    pub async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
