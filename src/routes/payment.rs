use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::fulfillment::{self, FulfillError, FulfillmentOutcome, OrderIntent};
use crate::printful::{self, Shipping};
use crate::routes::json_error;
use crate::stripe::{self, OrderIntentSummary};

const STRIPE_NOT_CONFIGURED: &str = "Stripe not configured. Add STRIPE_SECRET_KEY to .env file.";

/// Shipping as the client sends it: possibly partial, because express
/// wallets fill the address in during confirmation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialShipping {
    pub name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
}

impl PartialShipping {
    /// Complete enough to attach to a payment intent up front.
    fn into_shipping(self) -> Option<Shipping> {
        self.address.as_ref()?;
        Some(Shipping {
            name: self.name.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            address: self.address.unwrap_or_default(),
            city: self.city.unwrap_or_default(),
            state: self.state.unwrap_or_default(),
            zip: self.zip.unwrap_or_default(),
            country: self.country.unwrap_or_else(|| "US".to_string()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderDetails {
    pub design_id: Option<String>,
    pub title: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub quantity: Option<u32>,
}

impl OrderDetails {
    fn into_summary(self) -> OrderIntentSummary {
        OrderIntentSummary {
            design_id: self.design_id.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            size: self.size.unwrap_or_default(),
            color: self.color.unwrap_or_default(),
            quantity: self.quantity.unwrap_or(1),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub design_id: Option<String>,
    pub image_url: Option<String>,
    pub title: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub quantity: Option<u32>,
    pub shipping: Option<Shipping>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentRequest {
    pub amount: Option<i64>,
    pub shipping: Option<PartialShipping>,
    pub order_details: Option<OrderDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillOrderRequest {
    pub payment_intent_id: Option<String>,
    pub design_id: Option<String>,
    pub image_url: Option<String>,
    pub title: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub quantity: Option<u32>,
    pub shipping: Option<Shipping>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    pub payment_intent_id: Option<String>,
}

/// Redirect flow: hosted checkout session carrying the whole order intent as
/// metadata. Fulfillment happens in the webhook, never here.
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreatePaymentRequest>,
) -> Response {
    let (
        Some(design_id),
        Some(image_url),
        Some(title),
        Some(size),
        Some(color),
        Some(quantity),
        Some(shipping),
    ) = (
        request.design_id,
        request.image_url,
        request.title,
        request.size,
        request.color,
        request.quantity,
        request.shipping,
    )
    else {
        return json_error(StatusCode::BAD_REQUEST, "Missing required fields");
    };

    let Some(secret_key) = state.config.stripe_secret_key.as_deref() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": STRIPE_NOT_CONFIGURED})),
        )
            .into_response();
    };

    let order = OrderIntent {
        design_id,
        image_url,
        title,
        size,
        color,
        quantity,
        shipping,
    };
    match stripe::create_checkout_session(secret_key, &state.config.app_url, &order).await {
        Ok(session) => Json(json!({
            "success": true,
            "sessionId": session.id,
            "checkoutUrl": session.url,
        }))
        .into_response(),
        Err(err) => {
            tracing::error!(%err, "failed to create checkout session");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": err.to_string()})),
            )
                .into_response()
        }
    }
}

/// Embedded flow: intent created up front so express payment buttons can
/// render before the order form is complete.
pub async fn create_payment_intent(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreatePaymentIntentRequest>,
) -> Response {
    let Some(amount) = request.amount else {
        return json_error(StatusCode::BAD_REQUEST, "Missing required fields");
    };
    let Some(secret_key) = state.config.stripe_secret_key.as_deref() else {
        return json_error(StatusCode::BAD_REQUEST, STRIPE_NOT_CONFIGURED);
    };

    let shipping = request.shipping.and_then(PartialShipping::into_shipping);
    let summary = request.order_details.map(OrderDetails::into_summary);
    match stripe::create_payment_intent(secret_key, amount, shipping.as_ref(), summary.as_ref())
        .await
    {
        Ok(intent) => Json(json!({"clientSecret": intent.client_secret})).into_response(),
        Err(err) => {
            tracing::error!(%err, "failed to create payment intent");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        }
    }
}

/// Client callback after an embedded-flow confirmation: re-verify the intent
/// settled, then run the shared fulfillment pipeline.
pub async fn fulfill_order(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FulfillOrderRequest>,
) -> Response {
    let Some(payment_intent_id) = request.payment_intent_id else {
        return json_error(StatusCode::BAD_REQUEST, "Payment Intent ID is required");
    };
    let (
        Some(design_id),
        Some(image_url),
        Some(title),
        Some(size),
        Some(color),
        Some(quantity),
        Some(shipping),
    ) = (
        request.design_id,
        request.image_url,
        request.title,
        request.size,
        request.color,
        request.quantity,
        request.shipping,
    )
    else {
        return json_error(StatusCode::BAD_REQUEST, "Missing order details");
    };

    let Some(secret_key) = state.config.stripe_secret_key.as_deref() else {
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Stripe not configured");
    };
    let intent = match stripe::retrieve_payment_intent(secret_key, &payment_intent_id).await {
        Ok(intent) => intent,
        Err(err) => {
            tracing::error!(%err, "failed to retrieve payment intent");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        }
    };
    if !stripe::payment_succeeded(&intent) {
        return json_error(StatusCode::BAD_REQUEST, "Payment not completed");
    }

    let order = OrderIntent {
        design_id,
        image_url,
        title,
        size,
        color,
        quantity,
        shipping,
    };
    match fulfillment::fulfill(&state.config, &state.ledger, &intent.id, &order).await {
        Ok(FulfillmentOutcome::Submitted(print_order)) => Json(json!({
            "success": true,
            "orderId": print_order.id,
            "printfulOrderId": print_order.id,
            "message": "Order fulfilled successfully!",
        }))
        .into_response(),
        Ok(FulfillmentOutcome::AlreadyFulfilled) => Json(json!({
            "success": true,
            "alreadyFulfilled": true,
            "message": "Order already fulfilled for this payment.",
        }))
        .into_response(),
        Err(FulfillError::UnknownVariant { color, size }) => json_error(
            StatusCode::BAD_REQUEST,
            &format!("Variant not found for size {size} and color {color}"),
        ),
        Err(FulfillError::Hosting(err)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": err.message,
                "needsImageHosting": err.needs_image_hosting,
            })),
        )
            .into_response(),
        Err(FulfillError::PrintProviderNotConfigured) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Printful API key not configured")
        }
        Err(FulfillError::Submit(err)) => {
            tracing::error!(%err, "order fulfillment failed");
            let message = err.to_string();
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": message,
                    "needsImageHosting": printful::mentions_image_trouble(&message),
                })),
            )
                .into_response()
        }
    }
}

/// Re-checks an intent's settlement status independently of fulfillment.
pub async fn verify_payment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Response {
    let Some(payment_intent_id) = request.payment_intent_id else {
        return json_error(StatusCode::BAD_REQUEST, "Payment Intent ID is required");
    };
    let Some(secret_key) = state.config.stripe_secret_key.as_deref() else {
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Stripe not configured");
    };

    match stripe::retrieve_payment_intent(secret_key, &payment_intent_id).await {
        Ok(intent) if stripe::payment_succeeded(&intent) => Json(json!({
            "success": true,
            "message": "Payment verified successfully",
        }))
        .into_response(),
        Ok(intent) => Json(json!({
            "success": false,
            "error": format!("Payment status: {}", intent.status),
        }))
        .into_response(),
        Err(err) => {
            tracing::error!(%err, "failed to verify payment");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": err.to_string()})),
            )
                .into_response()
        }
    }
}
