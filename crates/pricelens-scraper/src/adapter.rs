//! Merchant adapters: one per data source, all behind a single capability
//! interface.
//!
//! The concrete [`ScrapingAdapter`] is driven entirely by per-merchant
//! configuration (URL templates + CSS selector set); there is no runtime
//! reflection. It acquires the domain's courtesy gate, fetches the result
//! page with the merchant's configured strategy, and lifts listings into the
//! unified [`RawListing`] shape.

use std::sync::Arc;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use scraper::{Html, Selector};
use tokio_util::sync::CancellationToken;

use pricelens_core::{
    AppConfig, Availability, ConfigError, FetchMode, MerchantSource, RawListing, SearchQuery,
    SelectorSet,
};

use crate::error::{AdapterError, Cancelled};
use crate::extract;
use crate::fetch::{Fetcher, RenderedFetcher, StaticFetcher};
use crate::rate_limit::RateLimiter;

/// Everything except alphanumerics and a few URL-safe marks gets escaped in
/// query templates.
const QUERY_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// One merchant's answer: the listings that parsed, plus how many items on
/// the page were dropped because an individual field was malformed.
#[derive(Debug, Default, Clone)]
pub struct AdapterBatch {
    pub listings: Vec<RawListing>,
    pub skipped_items: usize,
}

/// Capability interface every data source implements.
#[async_trait]
pub trait MerchantAdapter: Send + Sync {
    fn source(&self) -> &MerchantSource;

    /// Runs one search against this merchant.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] when the fetch fails, the page no longer
    /// matches the configured selectors, or `cancel` fires.
    async fn search(
        &self,
        query: &SearchQuery,
        cancel: &CancellationToken,
    ) -> Result<AdapterBatch, AdapterError>;
}

#[derive(Debug)]
struct CompiledSelectors {
    container: Selector,
    title: Selector,
    price: Selector,
    image: Selector,
    link: Selector,
    availability: Option<Selector>,
}

impl CompiledSelectors {
    fn compile(merchant: &str, set: &SelectorSet) -> Result<Self, ConfigError> {
        let parse = |label: &str, raw: &str| -> Result<Selector, ConfigError> {
            Selector::parse(raw).map_err(|_| {
                ConfigError::Validation(format!(
                    "merchant '{merchant}' has an invalid {label} selector: \"{raw}\""
                ))
            })
        };

        Ok(Self {
            container: parse("container", &set.container)?,
            title: parse("title", &set.title)?,
            price: parse("price", &set.price)?,
            image: parse("image", &set.image)?,
            link: parse("link", &set.link)?,
            availability: set
                .availability
                .as_deref()
                .map(|raw| parse("availability", raw))
                .transpose()?,
        })
    }
}

/// Configuration-driven scrape adapter for one merchant.
pub struct ScrapingAdapter {
    source: MerchantSource,
    fetcher: Fetcher,
    limiter: Arc<RateLimiter>,
    selectors: CompiledSelectors,
}

impl ScrapingAdapter {
    /// Builds an adapter, compiling its selector set and pinning its
    /// courtesy interval on the shared limiter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any configured CSS selector
    /// does not parse.
    pub fn new(
        source: MerchantSource,
        fetcher: Fetcher,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, ConfigError> {
        let selectors = CompiledSelectors::compile(&source.name, &source.selectors)?;
        if let Some(delay_ms) = source.request_delay_ms {
            limiter.register(&source.domain, std::time::Duration::from_millis(delay_ms));
        }
        Ok(Self {
            source,
            fetcher,
            limiter,
            selectors,
        })
    }

    /// The URL this adapter would request for `query`: the barcode-lookup
    /// template when the source supports it and a barcode was supplied, the
    /// search template otherwise.
    #[must_use]
    pub fn request_url(&self, query: &SearchQuery) -> String {
        if self.source.supports_barcode {
            if let (Some(barcode), Some(template)) = (query.barcode(), &self.source.barcode_url) {
                let encoded = utf8_percent_encode(barcode, QUERY_ENCODE).to_string();
                return template.replace("{barcode}", &encoded);
            }
        }
        let encoded = utf8_percent_encode(query.text.trim(), QUERY_ENCODE).to_string();
        self.source.search_url.replace("{query}", &encoded)
    }
}

#[async_trait]
impl MerchantAdapter for ScrapingAdapter {
    fn source(&self) -> &MerchantSource {
        &self.source
    }

    async fn search(
        &self,
        query: &SearchQuery,
        cancel: &CancellationToken,
    ) -> Result<AdapterBatch, AdapterError> {
        self.limiter.acquire(&self.source.domain, cancel).await?;

        let url = self.request_url(query);
        tracing::debug!(merchant = %self.source.name, %url, "fetching result page");

        let page = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AdapterError::Cancelled(Cancelled)),
            fetched = self.fetcher.fetch(&url) => fetched?,
        };

        let batch = parse_listings(
            &page.html,
            &self.source,
            &self.selectors,
            query.filters.max_results,
        )?;

        tracing::debug!(
            merchant = %self.source.name,
            listings = batch.listings.len(),
            skipped = batch.skipped_items,
            "parsed result page"
        );

        Ok(batch)
    }
}

/// Builds one adapter per configured source, wiring each to the transport
/// its `mode` demands and to the shared courtesy limiter.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] if an HTTP client cannot be built or
/// a source's selectors do not compile.
pub fn build_adapters(
    sources: Vec<MerchantSource>,
    config: &AppConfig,
    limiter: &Arc<RateLimiter>,
) -> Result<Vec<Arc<dyn MerchantAdapter>>, ConfigError> {
    sources
        .into_iter()
        .map(|source| {
            let fetcher = match source.mode {
                FetchMode::Static => Fetcher::Static(
                    StaticFetcher::new(config.fetch_timeout_secs, &config.user_agent).map_err(
                        |e| {
                            ConfigError::Validation(format!(
                                "failed to build HTTP client for '{}': {e}",
                                source.name
                            ))
                        },
                    )?,
                ),
                FetchMode::Rendered => Fetcher::Rendered(RenderedFetcher::new(
                    config.render_wait_secs,
                    config.render_settle_ms,
                )),
            };
            let adapter = ScrapingAdapter::new(source, fetcher, Arc::clone(limiter))?;
            Ok(Arc::new(adapter) as Arc<dyn MerchantAdapter>)
        })
        .collect()
}

/// Lifts listings out of a result page.
///
/// A malformed item (no title, unparseable price) is skipped and counted; a
/// page where the container selector matches nothing is structural drift and
/// fails the whole call.
fn parse_listings(
    html: &str,
    source: &MerchantSource,
    selectors: &CompiledSelectors,
    max_results: usize,
) -> Result<AdapterBatch, AdapterError> {
    let document = Html::parse_document(html);
    let base = source.base_url();

    let containers: Vec<_> = document.select(&selectors.container).collect();
    if containers.is_empty() {
        tracing::warn!(
            merchant = %source.name,
            selector = %source.selectors.container,
            "no result containers matched; selectors may be stale"
        );
        return Err(AdapterError::NoResultsOrStructureChanged);
    }

    let mut batch = AdapterBatch::default();

    for container in containers.into_iter().take(max_results.max(1)) {
        let Some(title) = extract::select_text(container, &selectors.title) else {
            batch.skipped_items += 1;
            continue;
        };

        let price = extract::select_text(container, &selectors.price)
            .as_deref()
            .and_then(extract::parse_price);
        let Some(base_price) = price else {
            batch.skipped_items += 1;
            continue;
        };

        let product_url = extract::select_link(container, &selectors.link, &base);
        let image_url = extract::select_image(container, &selectors.image, &base);

        let availability = match &selectors.availability {
            Some(selector) => container
                .select(selector)
                .next()
                .map(extract::text_of)
                .map_or(Availability::InStock, |text| {
                    extract::availability_from_text(&text)
                }),
            None => Availability::Unknown,
        };

        let merchant_id = source
            .selectors
            .id_attr
            .as_deref()
            .and_then(|attr| container.value().attr(attr))
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        batch.listings.push(RawListing {
            merchant: source.name.clone(),
            merchant_id,
            title,
            base_price,
            product_url,
            image_url,
            availability,
            brand: None,
            rating: None,
            review_count: None,
        });
    }

    Ok(batch)
}
