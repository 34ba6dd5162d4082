use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use pricelens_core::{AppConfig, MerchantStatus, SearchFilters, SearchQuery};
use pricelens_scraper::{
    build_adapters, EstimatedRates, MemoryStore, PriceNormalizer, QueryValidator, RateLimiter,
    ResultCache, SearchOrchestrator,
};

#[derive(Debug, Parser)]
#[command(name = "pricelens-cli")]
#[command(about = "Search and compare product prices across merchants")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one search across the configured merchants.
    Search {
        /// Free-text product query.
        query: String,
        /// Restrict the fan-out to these merchants (repeatable).
        #[arg(long)]
        merchant: Vec<String>,
        /// Barcode to use on merchants that support barcode lookup.
        #[arg(long)]
        barcode: Option<String>,
        #[arg(long)]
        min_price: Option<Decimal>,
        #[arg(long)]
        max_price: Option<Decimal>,
        #[arg(long)]
        brand: Option<String>,
        /// Drop out-of-stock listings from the output.
        #[arg(long)]
        in_stock_only: bool,
        #[arg(long, default_value_t = 20)]
        max_results: usize,
    },
    /// Ask the advisory validator about a query.
    Validate { query: String },
    /// List the configured merchants and their capabilities.
    Merchants,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = pricelens_core::load_app_config()?;

    match cli.command {
        Commands::Search {
            query,
            merchant,
            barcode,
            min_price,
            max_price,
            brand,
            in_stock_only,
            max_results,
        } => {
            let search = SearchQuery {
                text: query,
                barcode,
                filters: SearchFilters {
                    merchants: merchant,
                    min_price,
                    max_price,
                    brand,
                    include_out_of_stock: !in_stock_only,
                    max_results: max_results.clamp(1, 100),
                },
            };
            run_search(&config, &search).await
        }
        Commands::Validate { query } => run_validate(&config, &query).await,
        Commands::Merchants => run_merchants(&config),
    }
}

async fn run_search(config: &AppConfig, query: &SearchQuery) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let result = orchestrator
        .search(query, None, &CancellationToken::new())
        .await?;

    println!(
        "{} result(s) in {:.2}s from {}/{} merchant(s){}{}",
        result.total_results,
        result.search_time,
        result.merchants_responded,
        result.merchants_queried,
        if result.cached { " [cached]" } else { "" },
        if result.degraded {
            " [totals exclude shipping/tax]"
        } else {
            ""
        },
    );
    for product in &result.products {
        println!(
            "  ${:<9} {:<10} {}",
            product.total_price, product.merchant, product.title
        );
    }

    let problems: Vec<String> = result
        .statuses
        .iter()
        .filter_map(|entry| match &entry.status {
            MerchantStatus::TimedOut => Some(format!("{}: timed out", entry.merchant)),
            MerchantStatus::Failed { kind } => Some(format!("{}: {kind}", entry.merchant)),
            MerchantStatus::Responded { .. } | MerchantStatus::Skipped => None,
        })
        .collect();
    if !problems.is_empty() {
        println!("problems: {}", problems.join(", "));
    }

    Ok(())
}

async fn run_validate(config: &AppConfig, query: &str) -> anyhow::Result<()> {
    let validator = QueryValidator::new(
        config.validation_timeout_secs,
        &config.user_agent,
        Duration::from_secs(config.validation_cache_ttl_secs),
    )?;
    let verdict = validator.validate(query, &CancellationToken::new()).await;

    println!(
        "valid: {} (confidence {:.1})",
        verdict.is_valid, verdict.confidence
    );
    if !verdict.suggestions.is_empty() {
        println!("suggestions: {}", verdict.suggestions.join(", "));
    }
    Ok(())
}

fn run_merchants(config: &AppConfig) -> anyhow::Result<()> {
    let catalog = pricelens_core::load_merchants(&config.merchants_path)?;
    for merchant in &catalog.merchants {
        println!(
            "{:<10} {:<9} mode={:<8} barcode={:<5} stock-detection={}",
            merchant.name,
            if merchant.enabled {
                "enabled"
            } else {
                "disabled"
            },
            merchant.mode.to_string(),
            merchant.supports_barcode,
            merchant.detects_out_of_stock(),
        );
    }
    Ok(())
}

fn build_orchestrator(config: &AppConfig) -> anyhow::Result<SearchOrchestrator> {
    let catalog = pricelens_core::load_merchants(&config.merchants_path)?;
    let limiter = Arc::new(RateLimiter::new(
        Duration::from_millis(config.request_delay_ms),
        Duration::from_millis(config.request_jitter_ms),
    ));
    let adapters = build_adapters(catalog.merchants, config, &limiter)?;

    Ok(SearchOrchestrator::new(
        adapters,
        PriceNormalizer::new(Arc::new(EstimatedRates::new(
            config.shipping_enabled,
            config.tax_enabled,
        ))),
        ResultCache::new(Arc::new(MemoryStore::new())),
        Duration::from_secs(config.search_deadline_secs),
        Duration::from_secs(config.cache_ttl_secs),
    ))
}
