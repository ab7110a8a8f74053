//! Stripe integration via the REST API, no SDK dependency.

use anyhow::{Result, anyhow};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

use crate::fulfillment::OrderIntent;
use crate::printful::Shipping;

const STRIPE_API_ROOT: &str = "https://api.stripe.com/v1";

/// Approximate Printful base cost per shirt, in cents.
const BASE_COST_CENTS: i64 = 1200;
/// Selling price per item: base cost with a 50% markup.
pub const ITEM_PRICE_CENTS: i64 = BASE_COST_CENTS * 3 / 2;
pub const SHIPPING_COST_CENTS: i64 = 499;

const CHECKOUT_ALLOWED_COUNTRIES: [&str; 4] = ["US", "CA", "GB", "AU"];

/// Events older than this are rejected as replays.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    pub client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

pub fn payment_succeeded(intent: &PaymentIntent) -> bool {
    intent.status == "succeeded"
}

fn stripe_error_message(body: &Value) -> Option<String> {
    body.pointer("/error/message")
        .and_then(|value| value.as_str())
        .map(str::to_string)
}

async fn parse_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body: Value = response.json().await?;
    if !status.is_success() {
        let message = stripe_error_message(&body)
            .unwrap_or_else(|| format!("Stripe request failed with status {status}"));
        return Err(anyhow!(message));
    }
    Ok(serde_json::from_value(body)?)
}

/// Creates a payment intent for the embedded flow. Automatic payment methods
/// with redirects disabled, so card plus device wallets render in a payment
/// element. Shipping is optional here: express wallets may supply it during
/// confirmation instead.
pub async fn create_payment_intent(
    secret_key: &str,
    amount_cents: i64,
    shipping: Option<&Shipping>,
    order_details: Option<&OrderIntentSummary>,
) -> Result<PaymentIntent> {
    let mut form: Vec<(String, String)> = vec![
        ("amount".into(), amount_cents.to_string()),
        ("currency".into(), "usd".into()),
        ("automatic_payment_methods[enabled]".into(), "true".into()),
        (
            "automatic_payment_methods[allow_redirects]".into(),
            "never".into(),
        ),
    ];

    if let Some(shipping) = shipping {
        form.push(("shipping[name]".into(), shipping.name.clone()));
        form.push(("shipping[address][line1]".into(), shipping.address.clone()));
        form.push(("shipping[address][city]".into(), shipping.city.clone()));
        form.push(("shipping[address][state]".into(), shipping.state.clone()));
        form.push(("shipping[address][postal_code]".into(), shipping.zip.clone()));
        form.push(("shipping[address][country]".into(), shipping.country.clone()));
        // Shipping details also travel as metadata for fulfillment.
        form.push((
            "metadata[shipping]".into(),
            serde_json::to_string(shipping)?,
        ));
    }

    // The image URL is deliberately not stored: base64 designs blow past
    // Stripe's metadata size limit. Fulfillment re-supplies it.
    if let Some(details) = order_details {
        form.push(("metadata[designId]".into(), details.design_id.clone()));
        form.push(("metadata[title]".into(), details.title.clone()));
        form.push(("metadata[size]".into(), details.size.clone()));
        form.push(("metadata[color]".into(), details.color.clone()));
        form.push(("metadata[quantity]".into(), details.quantity.to_string()));
    }

    let client = Client::new();
    let response = client
        .post(format!("{STRIPE_API_ROOT}/payment_intents"))
        .basic_auth(secret_key, None::<&str>)
        .form(&form)
        .send()
        .await?;
    parse_response(response).await
}

pub async fn retrieve_payment_intent(secret_key: &str, intent_id: &str) -> Result<PaymentIntent> {
    let client = Client::new();
    let response = client
        .get(format!("{STRIPE_API_ROOT}/payment_intents/{intent_id}"))
        .basic_auth(secret_key, None::<&str>)
        .send()
        .await?;
    parse_response(response).await
}

/// Order fields carried as intent metadata; a compact view of the order
/// intent without the (potentially huge) image reference.
#[derive(Clone, Debug)]
pub struct OrderIntentSummary {
    pub design_id: String,
    pub title: String,
    pub size: String,
    pub color: String,
    pub quantity: u32,
}

/// Creates a hosted checkout session for the redirect flow. The full order
/// intent rides along as session metadata so the webhook can fulfill it
/// without any client involvement.
pub async fn create_checkout_session(
    secret_key: &str,
    app_url: &str,
    order: &OrderIntent,
) -> Result<CheckoutSession> {
    let description = format!("Custom T-shirt - {}, {}", order.size, order.color);
    let mut form: Vec<(String, String)> = vec![
        ("payment_method_types[0]".into(), "card".into()),
        ("mode".into(), "payment".into()),
        ("line_items[0][price_data][currency]".into(), "usd".into()),
        (
            "line_items[0][price_data][product_data][name]".into(),
            order.title.clone(),
        ),
        (
            "line_items[0][price_data][product_data][description]".into(),
            description,
        ),
        (
            "line_items[0][price_data][unit_amount]".into(),
            ITEM_PRICE_CENTS.to_string(),
        ),
        ("line_items[0][quantity]".into(), order.quantity.to_string()),
        ("line_items[1][price_data][currency]".into(), "usd".into()),
        (
            "line_items[1][price_data][product_data][name]".into(),
            "Shipping".into(),
        ),
        (
            "line_items[1][price_data][unit_amount]".into(),
            SHIPPING_COST_CENTS.to_string(),
        ),
        ("line_items[1][quantity]".into(), "1".into()),
        (
            "success_url".into(),
            format!("{app_url}/order-success?session_id={{CHECKOUT_SESSION_ID}}"),
        ),
        ("cancel_url".into(), format!("{app_url}/?canceled=true")),
        ("customer_email".into(), order.shipping.email.clone()),
        ("metadata[designId]".into(), order.design_id.clone()),
        ("metadata[imageUrl]".into(), order.image_url.clone()),
        ("metadata[title]".into(), order.title.clone()),
        ("metadata[size]".into(), order.size.clone()),
        ("metadata[color]".into(), order.color.clone()),
        ("metadata[quantity]".into(), order.quantity.to_string()),
        (
            "metadata[shipping]".into(),
            serde_json::to_string(&order.shipping)?,
        ),
    ];
    // Checkout shows images only for hosted URLs; inline designs are skipped.
    if order.image_url.starts_with("http") {
        form.push((
            "line_items[0][price_data][product_data][images][0]".into(),
            order.image_url.clone(),
        ));
    }
    for (index, country) in CHECKOUT_ALLOWED_COUNTRIES.iter().enumerate() {
        form.push((
            format!("shipping_address_collection[allowed_countries][{index}]"),
            (*country).to_string(),
        ));
    }

    let client = Client::new();
    let response = client
        .post(format!("{STRIPE_API_ROOT}/checkout/sessions"))
        .basic_auth(secret_key, None::<&str>)
        .form(&form)
        .send()
        .await?;
    parse_response(response).await
}

/// Verifies a `Stripe-Signature` header: HMAC-SHA256 over
/// `"{timestamp}.{payload}"`, hex-encoded in the `v1` component, compared in
/// constant time, with a replay window on the timestamp.
pub fn verify_webhook_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
) -> Result<(), &'static str> {
    let mut timestamp = "";
    let mut signature = "";
    for part in sig_header.split(',') {
        if let Some(value) = part.trim().strip_prefix("t=") {
            timestamp = value;
        } else if let Some(value) = part.trim().strip_prefix("v1=") {
            signature = value;
        }
    }
    if timestamp.is_empty() || signature.is_empty() {
        return Err("Invalid Stripe-Signature header");
    }

    let signed_payload = format!("{timestamp}.{}", std::str::from_utf8(payload).unwrap_or(""));
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(signed_payload.as_bytes());
    let sig_bytes = hex::decode(signature).map_err(|_| "Invalid signature hex")?;
    mac.verify_slice(&sig_bytes)
        .map_err(|_| "Webhook signature mismatch")?;

    let ts: i64 = timestamp.parse().map_err(|_| "Invalid timestamp")?;
    let now = chrono::Utc::now().timestamp();
    if (now - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err("Webhook timestamp too old");
    }

    Ok(())
}

/// Builds a valid `Stripe-Signature` header for a payload; test-side
/// counterpart of `verify_webhook_signature`.
#[cfg(test)]
pub fn sign_payload_for_tests(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let signed_payload = format!("{timestamp}.{}", std::str::from_utf8(payload).unwrap());
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(signed_payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp},v1={signature}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    #[test]
    fn valid_signature_verifies() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = sign_payload_for_tests(payload, SECRET, chrono::Utc::now().timestamp());
        assert!(verify_webhook_signature(payload, &header, SECRET).is_ok());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = sign_payload_for_tests(payload, SECRET, chrono::Utc::now().timestamp());
        assert!(verify_webhook_signature(b"{}", &header, SECRET).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let payload = b"body";
        let header = sign_payload_for_tests(payload, SECRET, chrono::Utc::now().timestamp());
        assert!(verify_webhook_signature(payload, &header, "whsec_other").is_err());
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let payload = b"body";
        let old = chrono::Utc::now().timestamp() - 3600;
        let header = sign_payload_for_tests(payload, SECRET, old);
        assert_eq!(
            verify_webhook_signature(payload, &header, SECRET),
            Err("Webhook timestamp too old")
        );
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert!(verify_webhook_signature(b"body", "", SECRET).is_err());
        assert!(verify_webhook_signature(b"body", "t=123", SECRET).is_err());
        assert!(verify_webhook_signature(b"body", "v1=deadbeef", SECRET).is_err());
    }

    #[test]
    fn succeeded_is_the_only_settled_status() {
        let settled = PaymentIntent {
            id: "pi_1".into(),
            status: "succeeded".into(),
            client_secret: None,
        };
        let pending = PaymentIntent {
            id: "pi_2".into(),
            status: "requires_action".into(),
            client_secret: None,
        };
        assert!(payment_succeeded(&settled));
        assert!(!payment_succeeded(&pending));
    }

    #[test]
    fn item_price_applies_the_markup() {
        assert_eq!(ITEM_PRICE_CENTS, 1800);
    }
}
