use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use trendtee::{
    AppState,
    cache::DesignCache,
    config::Config,
    fulfillment::FulfillmentLedger,
    routes,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("trendtee=info,tower_http=info")),
        )
        .init();

    let port = env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3000);
    let bind_address = format!("0.0.0.0:{}", port);

    let config = Config::from_env();
    tracing::info!(
        stability = config.stability_api_key.is_some(),
        openai = config.openai_api_key.is_some(),
        printful = config.printful_api_key.is_some(),
        stripe = config.stripe_secret_key.is_some(),
        imgbb = config.imgbb_api_key.is_some(),
        "provider keys configured"
    );

    let cache_dir = resolve_cache_dir();
    let state = Arc::new(AppState {
        config,
        cache: DesignCache::new(cache_dir.join("designs")),
        ledger: FulfillmentLedger::new(cache_dir.join("fulfillments")),
    });

    let router = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());
    let tcp_listener = tokio::net::TcpListener::bind(&bind_address).await?;

    tracing::info!("trendtee server started at http://{bind_address}");

    let _ = axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
    Ok(())
}

fn resolve_cache_dir() -> PathBuf {
    let cache_dir = env::var("CACHE_DIR")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from);
    if let Some(dir) = cache_dir {
        return dir;
    }
    let mut base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
    base.push("trendtee");
    base
}
