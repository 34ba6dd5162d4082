mod api;
mod geo;
mod middleware;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use pricelens_scraper::{
    build_adapters, EstimatedRates, MemoryStore, PriceNormalizer, QueryValidator, RateLimiter,
    ResultCache, SearchOrchestrator,
};

use crate::api::{build_app, default_rate_limit_state, AppState};
use crate::geo::GeoResolver;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(pricelens_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let catalog = pricelens_core::load_merchants(&config.merchants_path)?;
    tracing::info!(
        merchants = catalog.merchants.len(),
        path = %config.merchants_path.display(),
        "merchant catalog loaded"
    );

    let limiter = Arc::new(RateLimiter::new(
        Duration::from_millis(config.request_delay_ms),
        Duration::from_millis(config.request_jitter_ms),
    ));
    let sources = catalog.merchants;
    let adapters = build_adapters(sources.clone(), &config, &limiter)?;

    let orchestrator = Arc::new(SearchOrchestrator::new(
        adapters,
        PriceNormalizer::new(Arc::new(EstimatedRates::new(
            config.shipping_enabled,
            config.tax_enabled,
        ))),
        ResultCache::new(Arc::new(MemoryStore::new())),
        Duration::from_secs(config.search_deadline_secs),
        Duration::from_secs(config.cache_ttl_secs),
    ));

    let validator = Arc::new(QueryValidator::new(
        config.validation_timeout_secs,
        &config.user_agent,
        Duration::from_secs(config.validation_cache_ttl_secs),
    )?);

    let geo = Arc::new(GeoResolver::new(&config.geolocation_url)?);

    let state = AppState {
        orchestrator,
        validator,
        geo,
        sources: Arc::new(sources),
        validation_enabled: config.validation_enabled,
    };
    let app = build_app(state, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "pricelens server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
