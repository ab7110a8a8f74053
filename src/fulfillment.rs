use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::fs;

use crate::cache::compute_hash;
use crate::config::Config;
use crate::hosting::{self, HostingError};
use crate::printful::{self, PrintOrder, ResolvedOrder, Shipping};

/// Everything needed to fulfill one checkout attempt. Transient: built per
/// request, persisted only inside the payment provider's own metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderIntent {
    pub design_id: String,
    pub image_url: String,
    pub title: String,
    pub size: String,
    pub color: String,
    pub quantity: u32,
    pub shipping: Shipping,
}

#[derive(Debug)]
pub enum FulfillError {
    /// (color, size) pair outside the variant table. Client error.
    UnknownVariant { color: String, size: String },
    /// Image could not be materialized to an HTTP URL. Client error, with
    /// the hosting remediation flag.
    Hosting(HostingError),
    /// Printful credentials missing; the operator needs to add a key.
    PrintProviderNotConfigured,
    /// Printful rejected the order.
    Submit(anyhow::Error),
}

impl std::fmt::Display for FulfillError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FulfillError::UnknownVariant { color, size } => {
                write!(f, "Variant not found for size {size} and color {color}")
            }
            FulfillError::Hosting(err) => write!(f, "{err}"),
            FulfillError::PrintProviderNotConfigured => {
                write!(f, "Printful API key not configured")
            }
            FulfillError::Submit(err) => write!(f, "{err}"),
        }
    }
}

#[derive(Debug)]
pub enum FulfillmentOutcome {
    Submitted(PrintOrder),
    /// A marker for this payment already exists; no second order was placed.
    AlreadyFulfilled,
}

/// File-based check-and-set record of fulfillment attempts, keyed by the
/// payment reference (intent or session id). `create_new` makes the claim
/// atomic on the filesystem, which closes the webhook-vs-callback double
/// submission race.
#[derive(Clone, Debug)]
pub struct FulfillmentLedger {
    dir: PathBuf,
}

pub enum MarkerClaim {
    Acquired,
    AlreadyFulfilled,
}

impl FulfillmentLedger {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn marker_path(&self, payment_ref: &str) -> PathBuf {
        self.dir
            .join(format!("fulfilled-{}.json", compute_hash(payment_ref)))
    }

    /// Claims the payment reference. Exactly one caller wins; everyone else
    /// sees `AlreadyFulfilled`.
    pub async fn try_claim(&self, payment_ref: &str) -> MarkerClaim {
        if let Err(err) = fs::create_dir_all(&self.dir).await {
            // Without a writable ledger the dedup guarantee is gone, but
            // fulfillment itself must still proceed.
            tracing::warn!(%err, "fulfillment ledger unavailable, skipping dedup");
            return MarkerClaim::Acquired;
        }
        let path = self.marker_path(payment_ref);
        let open = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;
        match open {
            Ok(_) => {
                let body = json!({
                    "paymentRef": payment_ref,
                    "startedAt": Utc::now().to_rfc3339(),
                });
                if let Err(err) = fs::write(&path, body.to_string()).await {
                    tracing::warn!(%err, "failed to record fulfillment marker body");
                }
                MarkerClaim::Acquired
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                MarkerClaim::AlreadyFulfilled
            }
            Err(err) => {
                tracing::warn!(%err, "fulfillment marker write failed, skipping dedup");
                MarkerClaim::Acquired
            }
        }
    }

    /// Releases a claim after a failed submission so a retry can succeed.
    pub async fn release(&self, payment_ref: &str) {
        let path = self.marker_path(payment_ref);
        if let Err(err) = fs::remove_file(&path).await {
            tracing::warn!(%err, "failed to release fulfillment marker");
        }
    }

    /// Records the provider order id against a claimed payment reference.
    pub async fn record_order(&self, payment_ref: &str, order: &PrintOrder) {
        let path = self.marker_path(payment_ref);
        let body = json!({
            "paymentRef": payment_ref,
            "printfulOrderId": order.id,
            "fulfilledAt": Utc::now().to_rfc3339(),
        });
        if let Err(err) = fs::write(&path, body.to_string()).await {
            tracing::warn!(%err, "failed to record fulfilled order id");
        }
    }
}

/// Shared tail of both payment flows: materialize the image, resolve the
/// variant, submit to Printful, at most once per payment reference.
pub async fn fulfill(
    config: &Config,
    ledger: &FulfillmentLedger,
    payment_ref: &str,
    order: &OrderIntent,
) -> Result<FulfillmentOutcome, FulfillError> {
    // Reject before any network call or marker claim.
    let variant_id = printful::variant_id(&order.color, &order.size).ok_or_else(|| {
        FulfillError::UnknownVariant {
            color: order.color.clone(),
            size: order.size.clone(),
        }
    })?;

    let api_key = config
        .printful_api_key
        .as_deref()
        .ok_or(FulfillError::PrintProviderNotConfigured)?;

    let image_url = hosting::ensure_http_url(config.imgbb_api_key.as_deref(), &order.image_url)
        .await
        .map_err(FulfillError::Hosting)?;

    if let MarkerClaim::AlreadyFulfilled = ledger.try_claim(payment_ref).await {
        tracing::info!(payment_ref, "payment already fulfilled, skipping order");
        return Ok(FulfillmentOutcome::AlreadyFulfilled);
    }

    let resolved = ResolvedOrder {
        variant_id,
        quantity: order.quantity,
        image_url,
        shipping: order.shipping.clone(),
    };
    match printful::submit_order(api_key, &resolved).await {
        Ok(print_order) => {
            ledger.record_order(payment_ref, &print_order).await;
            tracing::info!(payment_ref, order_id = print_order.id, "order fulfilled");
            Ok(FulfillmentOutcome::Submitted(print_order))
        }
        Err(err) => {
            ledger.release(payment_ref).await;
            Err(FulfillError::Submit(err))
        }
    }
}
