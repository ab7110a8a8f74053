use anyhow::{Result, anyhow};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

const PRINTFUL_ORDERS_URL: &str = "https://api.printful.com/orders";

/// Front-print placement for the Gildan 64000 template. Single supported
/// garment, so the geometry is fixed.
const PRINT_AREA_WIDTH: u32 = 1800;
const PRINT_AREA_HEIGHT: u32 = 2400;
const PRINT_SIZE: u32 = 1800;
const PRINT_TOP: u32 = 300;
const PRINT_LEFT: u32 = 0;

pub const SIZES: [&str; 7] = ["XS", "S", "M", "L", "XL", "2XL", "3XL"];
pub const COLORS: [&str; 5] = ["white", "black", "navy", "gray", "red"];

/// Printful catalog variant for a (color, size) pair of the Gildan 64000
/// Unisex Softstyle T-Shirt. Ids are contiguous per color, XS..3XL.
pub fn variant_id(color: &str, size: &str) -> Option<u32> {
    let base = match color {
        "white" => 4011,
        "black" => 4018,
        "navy" => 4025,
        "gray" => 4032,
        "red" => 4039,
        _ => return None,
    };
    let offset = SIZES.iter().position(|candidate| *candidate == size)?;
    Some(base + offset as u32)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipping {
    pub name: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
}

/// A fully resolved, ready-to-submit order: variant already looked up and
/// image already materialized to an HTTP URL.
#[derive(Clone, Debug)]
pub struct ResolvedOrder {
    pub variant_id: u32,
    pub quantity: u32,
    pub image_url: String,
    pub shipping: Shipping,
}

#[derive(Clone, Debug)]
pub struct PrintOrder {
    pub id: u64,
    pub order_url: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    result: Option<OrderResult>,
}

#[derive(Debug, Deserialize)]
struct OrderResult {
    id: Option<u64>,
}

fn order_payload(order: &ResolvedOrder) -> Value {
    json!({
        "recipient": {
            "name": order.shipping.name,
            "email": order.shipping.email,
            "address1": order.shipping.address,
            "city": order.shipping.city,
            "state_code": order.shipping.state,
            "country_code": order.shipping.country,
            "zip": order.shipping.zip,
        },
        "items": [
            {
                "variant_id": order.variant_id,
                "quantity": order.quantity,
                "files": [
                    {
                        "type": "front",
                        "url": order.image_url,
                        "position": {
                            "area_width": PRINT_AREA_WIDTH,
                            "area_height": PRINT_AREA_HEIGHT,
                            "width": PRINT_SIZE,
                            "height": PRINT_SIZE,
                            "top": PRINT_TOP,
                            "left": PRINT_LEFT,
                        },
                    }
                ],
            }
        ],
    })
}

/// Pulls Printful's own message out of an error body, which nests it under
/// several different shapes depending on the failure.
fn provider_error_message(body: &Value) -> Option<String> {
    body.pointer("/result/message")
        .or_else(|| body.pointer("/error/message"))
        .or_else(|| body.get("error"))
        .or_else(|| body.get("result"))
        .and_then(|value| value.as_str())
        .map(str::to_string)
}

/// True when a provider message looks like an image-handling problem, which
/// usually means the design needs external hosting.
pub fn mentions_image_trouble(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("file") || lower.contains("image")
}

/// Creates a single-item order. The caller guarantees the invariants this
/// layer depends on: a resolved variant and an http(s) image URL.
pub async fn submit_order(api_key: &str, order: &ResolvedOrder) -> Result<PrintOrder> {
    let payload = order_payload(order);
    tracing::info!(variant_id = order.variant_id, "submitting Printful order");

    let client = Client::new();
    let response = client
        .post(PRINTFUL_ORDERS_URL)
        .bearer_auth(api_key)
        .json(&payload)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = provider_error_message(&body)
            .unwrap_or_else(|| format!("Printful request failed with status {status}"));
        return Err(anyhow!(message));
    }

    let payload: OrderResponse = response.json().await?;
    let id = payload
        .result
        .and_then(|result| result.id)
        .ok_or_else(|| anyhow!("Failed to create order in Printful"))?;

    Ok(PrintOrder {
        id,
        order_url: format!("https://www.printful.com/dashboard/orders/{id}"),
    })
}
