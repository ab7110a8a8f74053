use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::AppState;
use crate::hosting::{self, HOSTING_REMEDIATION};
use crate::printful::{self, ResolvedOrder, Shipping};
use crate::routes::json_error;

const RETAIL_PRICE_USD: f64 = 24.99;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    pub design_id: Option<String>,
    pub image_url: Option<String>,
    pub title: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub quantity: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub design_id: Option<String>,
    pub image_url: Option<String>,
    pub title: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub quantity: Option<u32>,
    pub shipping: Option<Shipping>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductData {
    name: String,
    image_url: String,
    variant_id: u32,
    size: String,
    color: String,
    quantity: u32,
    price: f64,
}

fn variant_error(size: &str, color: &str) -> Response {
    json_error(
        StatusCode::BAD_REQUEST,
        &format!("Variant not found for size {size} and color {color}"),
    )
}

/// Validates the order intent and resolves its variant. No product is
/// created up front; the order itself is placed after payment.
pub async fn create_checkout(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateCheckoutRequest>,
) -> Response {
    let (Some(_design_id), Some(image_url), Some(title), Some(size), Some(color), Some(quantity)) = (
        request.design_id,
        request.image_url,
        request.title,
        request.size,
        request.color,
        request.quantity,
    ) else {
        return json_error(StatusCode::BAD_REQUEST, "Missing required fields");
    };

    // Variant resolution happens before any provider branch so an unknown
    // pair is rejected even in demo mode.
    let Some(variant_id) = printful::variant_id(&color, &size) else {
        return variant_error(&size, &color);
    };

    if state.config.printful_api_key.is_none() {
        return Json(json!({
            "success": true,
            "checkoutUrl": "#",
            "message": "Printful API key not configured. In production, this would create a real checkout.",
            "productId": format!("product-{}", Utc::now().timestamp_millis()),
        }))
        .into_response();
    }

    let is_base64 = image_url.starts_with("data:");
    Json(json!({
        "success": true,
        "checkoutUrl": serde_json::Value::Null,
        "productId": serde_json::Value::Null,
        "variantId": variant_id,
        "productData": ProductData {
            name: title,
            image_url,
            variant_id,
            size,
            color,
            quantity,
            price: RETAIL_PRICE_USD,
        },
        "message": "Product ready for checkout",
        "isBase64": is_base64,
    }))
    .into_response()
}

/// Places a Printful order directly, with no payment gate. Used by the demo
/// shipping form; the paid flows go through the fulfillment pipeline instead.
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateOrderRequest>,
) -> Response {
    let (
        Some(_design_id),
        Some(image_url),
        Some(_title),
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

    let Some(variant_id) = printful::variant_id(&color, &size) else {
        return variant_error(&size, &color);
    };

    // Materialize before the demo branch: an inline design that cannot be
    // hosted is an actionable error even without a Printful key.
    let final_image_url =
        match hosting::ensure_http_url(state.config.imgbb_api_key.as_deref(), &image_url).await {
            Ok(url) => url,
            Err(err) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "success": false,
                        "error": err.message,
                        "needsImageHosting": err.needs_image_hosting,
                        "solution": HOSTING_REMEDIATION,
                    })),
                )
                    .into_response();
            }
        };

    let Some(api_key) = state.config.printful_api_key.as_deref() else {
        return Json(json!({
            "success": true,
            "orderUrl": "#",
            "message": "Printful API key not configured. In production, this would create a real order.",
            "orderId": format!("demo-order-{}", Utc::now().timestamp_millis()),
        }))
        .into_response();
    };

    let order = ResolvedOrder {
        variant_id,
        quantity,
        image_url: final_image_url,
        shipping,
    };
    match printful::submit_order(api_key, &order).await {
        Ok(print_order) => Json(json!({
            "success": true,
            "orderId": print_order.id,
            "orderUrl": print_order.order_url,
            "message": "Order created successfully! You will receive a confirmation email.",
        }))
        .into_response(),
        Err(err) => {
            tracing::error!(%err, "order creation failed");
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::routes::test_support::{body_json, state_with};

    fn checkout_request(color: &str, size: &str) -> CreateCheckoutRequest {
        CreateCheckoutRequest {
            design_id: Some("design-1".to_string()),
            image_url: Some("https://example.com/design.png".to_string()),
            title: Some("Space Tee".to_string()),
            size: Some(size.to_string()),
            color: Some(color.to_string()),
            quantity: Some(1),
        }
    }

    fn shipping() -> Shipping {
        Shipping {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            address: "1 Way".to_string(),
            city: "London".to_string(),
            state: "LDN".to_string(),
            zip: "E1".to_string(),
            country: "GB".to_string(),
        }
    }

    #[tokio::test]
    async fn unknown_variant_is_rejected_naming_the_pair() {
        let (_dir, state) = state_with(Config::default());
        let response =
            create_checkout(State(state), Json(checkout_request("purple", "M"))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        let error = body["error"].as_str().unwrap();
        assert!(error.contains("purple"));
        assert!(error.contains("M"));
    }

    #[tokio::test]
    async fn missing_fields_are_rejected() {
        let (_dir, state) = state_with(Config::default());
        let request = CreateCheckoutRequest {
            design_id: None,
            image_url: None,
            title: None,
            size: None,
            color: None,
            quantity: None,
        };
        let response = create_checkout(State(state), Json(request)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn checkout_without_printful_key_returns_demo_payload() {
        let (_dir, state) = state_with(Config::default());
        let response = create_checkout(State(state), Json(checkout_request("black", "M"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["checkoutUrl"], "#");
    }

    #[tokio::test]
    async fn configured_checkout_resolves_the_variant() {
        let (_dir, state) = state_with(Config {
            printful_api_key: Some("pf_key".to_string()),
            ..Config::default()
        });
        let response = create_checkout(State(state), Json(checkout_request("black", "M"))).await;
        let body = body_json(response).await;
        assert_eq!(body["variantId"], 4020);
        assert_eq!(body["productData"]["price"], 24.99);
        assert_eq!(body["isBase64"], false);
    }

    #[tokio::test]
    async fn inline_order_without_hosting_key_flags_remediation() {
        let (_dir, state) = state_with(Config::default());
        let request = CreateOrderRequest {
            design_id: Some("design-1".to_string()),
            image_url: Some("data:image/png;base64,aGVsbG8=".to_string()),
            title: Some("Space Tee".to_string()),
            size: Some("M".to_string()),
            color: Some("black".to_string()),
            quantity: Some(1),
            shipping: Some(shipping()),
        };
        let response = create_order(State(state), Json(request)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["needsImageHosting"], true);
        assert!(body["error"].as_str().unwrap().contains("ImgBB"));
        assert!(body["solution"].as_str().unwrap().contains("api.imgbb.com"));
    }

    #[tokio::test]
    async fn hosted_image_order_without_printful_key_is_demo_success() {
        let (_dir, state) = state_with(Config::default());
        let request = CreateOrderRequest {
            design_id: Some("design-1".to_string()),
            image_url: Some("https://example.com/design.png".to_string()),
            title: Some("Space Tee".to_string()),
            size: Some("M".to_string()),
            color: Some("black".to_string()),
            quantity: Some(1),
            shipping: Some(shipping()),
        };
        let response = create_order(State(state), Json(request)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert!(body["orderId"].as_str().unwrap().starts_with("demo-order-"));
    }
}
