pub mod cache;
pub mod config;
pub mod design;
pub mod fulfillment;
pub mod genai;
pub mod hosting;
pub mod printful;
pub mod routes;
pub mod stripe;
pub mod trending;

use cache::DesignCache;
use config::Config;
use fulfillment::FulfillmentLedger;

/// Shared per-process state handed to every handler.
pub struct AppState {
    pub config: Config,
    pub cache: DesignCache,
    pub ledger: FulfillmentLedger,
}
