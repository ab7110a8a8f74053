use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::AppState;
use crate::fulfillment::{self, FulfillmentOutcome, OrderIntent};
use crate::printful::Shipping;
use crate::routes::json_error;
use crate::stripe;

/// Stripe webhook entry point. Signature failures are client errors; after
/// that, every internal failure is logged and swallowed so Stripe is always
/// acknowledged — redeliveries cannot fix a missing key or a bad variant.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let Some(signature) = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
    else {
        return json_error(StatusCode::BAD_REQUEST, "No signature");
    };

    let secret = state.config.stripe_webhook_secret.as_deref().unwrap_or("");
    if let Err(err) = stripe::verify_webhook_signature(body.as_bytes(), signature, secret) {
        tracing::warn!(err, "webhook signature verification failed");
        return json_error(StatusCode::BAD_REQUEST, &format!("Webhook Error: {err}"));
    }

    let event: Value = match serde_json::from_str(&body) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(%err, "webhook payload is not valid JSON");
            return json_error(StatusCode::BAD_REQUEST, "Invalid webhook payload");
        }
    };

    if event["type"] == "checkout.session.completed" {
        handle_checkout_completed(&state, &event["data"]["object"]).await;
    }

    Json(json!({"received": true})).into_response()
}

/// Pulls the order intent out of session metadata and runs fulfillment.
/// Never propagates an error to the HTTP response.
async fn handle_checkout_completed(state: &AppState, session: &Value) {
    let session_id = session["id"].as_str().unwrap_or("unknown-session");
    let metadata = &session["metadata"];

    let (Some(image_url), Some(title), Some(size), Some(color), Some(quantity), Some(shipping_raw)) = (
        metadata["imageUrl"].as_str(),
        metadata["title"].as_str(),
        metadata["size"].as_str(),
        metadata["color"].as_str(),
        metadata["quantity"].as_str(),
        metadata["shipping"].as_str(),
    ) else {
        tracing::error!(session_id, "missing order details in session metadata");
        return;
    };

    let quantity: u32 = match quantity.parse() {
        Ok(quantity) => quantity,
        Err(_) => {
            tracing::error!(session_id, quantity, "invalid quantity in session metadata");
            return;
        }
    };
    let shipping: Shipping = match serde_json::from_str(shipping_raw) {
        Ok(shipping) => shipping,
        Err(err) => {
            tracing::error!(session_id, %err, "invalid shipping in session metadata");
            return;
        }
    };

    let order = OrderIntent {
        design_id: metadata["designId"].as_str().unwrap_or_default().to_string(),
        image_url: image_url.to_string(),
        title: title.to_string(),
        size: size.to_string(),
        color: color.to_string(),
        quantity,
        shipping,
    };

    match fulfillment::fulfill(&state.config, &state.ledger, session_id, &order).await {
        Ok(FulfillmentOutcome::Submitted(print_order)) => {
            tracing::info!(session_id, order_id = print_order.id, "order fulfilled via webhook");
        }
        Ok(FulfillmentOutcome::AlreadyFulfilled) => {
            tracing::info!(session_id, "webhook skipped an already fulfilled payment");
        }
        Err(err) => {
            // Accepted gap: the event is still acknowledged, and the order
            // may need manual reconciliation.
            tracing::error!(session_id, %err, "webhook fulfillment failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::routes::test_support::{body_json, state_with};
    use axum::http::HeaderValue;

    const SECRET: &str = "whsec_test_secret";

    fn signed_headers(body: &str, secret: &str) -> HeaderMap {
        let header =
            stripe::sign_payload_for_tests(body.as_bytes(), secret, chrono::Utc::now().timestamp());
        let mut headers = HeaderMap::new();
        headers.insert("stripe-signature", HeaderValue::from_str(&header).unwrap());
        headers
    }

    fn webhook_state() -> (tempfile::TempDir, Arc<AppState>) {
        state_with(Config {
            stripe_webhook_secret: Some(SECRET.to_string()),
            ..Config::default()
        })
    }

    #[tokio::test]
    async fn missing_signature_is_rejected() {
        let (_dir, state) = webhook_state();
        let response = stripe_webhook(State(state), HeaderMap::new(), "{}".to_string()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "No signature");
    }

    #[tokio::test]
    async fn invalid_signature_is_rejected() {
        let (_dir, state) = webhook_state();
        let body = r#"{"type":"checkout.session.completed"}"#.to_string();
        let headers = signed_headers(&body, "whsec_wrong_secret");
        let response = stripe_webhook(State(state), headers, body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let payload = body_json(response).await;
        assert!(payload["error"].as_str().unwrap().starts_with("Webhook Error:"));
    }

    #[tokio::test]
    async fn signed_unrelated_event_is_acknowledged() {
        let (_dir, state) = webhook_state();
        let body = r#"{"type":"payment_intent.created"}"#.to_string();
        let headers = signed_headers(&body, SECRET);
        let response = stripe_webhook(State(state), headers, body).await;
        assert_eq!(response.status(), StatusCode::OK);
        let payload = body_json(response).await;
        assert_eq!(payload["received"], true);
    }

    #[tokio::test]
    async fn completed_session_with_bad_metadata_is_still_acknowledged() {
        let (_dir, state) = webhook_state();
        let body = json!({
            "type": "checkout.session.completed",
            "data": {"object": {"id": "cs_test_1", "metadata": {}}},
        })
        .to_string();
        let headers = signed_headers(&body, SECRET);
        let response = stripe_webhook(State(state), headers, body).await;
        assert_eq!(response.status(), StatusCode::OK);
        let payload = body_json(response).await;
        assert_eq!(payload["received"], true);
    }
}
