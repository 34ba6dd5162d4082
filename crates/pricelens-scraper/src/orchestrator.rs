//! The search orchestrator: fans one query out to every selected merchant,
//! bounds the whole thing with a global deadline, and merges whatever came
//! back into one deterministic, ranked result.
//!
//! Flow: fingerprint → cache lookup (hit returns immediately) → concurrent
//! per-merchant tasks sharing one cancellation signal → normalize + merge →
//! rank → post-rank filtering → status metadata. Partial failure is still a
//! success; only "everything broke" and "empty query" surface as errors.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use pricelens_core::{
    Availability, LocationContext, MerchantStatus, MerchantStatusEntry, NormalizedListing,
    RawListing, SearchFilters, SearchQuery, SearchResult,
};

use crate::adapter::MerchantAdapter;
use crate::cache::ResultCache;
use crate::error::{AdapterError, OrchestratorError};
use crate::fingerprint::fingerprint;
use crate::normalize::PriceNormalizer;

/// Hard bound on how many listings one response can carry.
const MAX_RESULTS_CEILING: usize = 100;

struct MerchantReport {
    merchant: String,
    status: MerchantStatus,
    listings: Vec<NormalizedListing>,
    degraded: bool,
}

pub struct SearchOrchestrator {
    adapters: Vec<Arc<dyn MerchantAdapter>>,
    normalizer: PriceNormalizer,
    cache: ResultCache,
    deadline: Duration,
    cache_ttl: Duration,
}

impl SearchOrchestrator {
    #[must_use]
    pub fn new(
        adapters: Vec<Arc<dyn MerchantAdapter>>,
        normalizer: PriceNormalizer,
        cache: ResultCache,
        deadline: Duration,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            adapters,
            normalizer,
            cache,
            deadline,
            cache_ttl,
        }
    }

    /// Resolves one query into a ranked result.
    ///
    /// `cancel` is the caller's signal (e.g. client disconnect); the global
    /// deadline is layered on top of it, so both abort in-flight work the
    /// same way.
    ///
    /// # Errors
    ///
    /// - [`OrchestratorError::InvalidQuery`] — blank query with no barcode.
    /// - [`OrchestratorError::AllMerchantsFailed`] — no merchant responded
    ///   successfully (an empty listing set from a responding merchant is a
    ///   success, not a failure).
    pub async fn search(
        &self,
        query: &SearchQuery,
        location: Option<&LocationContext>,
        cancel: &CancellationToken,
    ) -> Result<SearchResult, OrchestratorError> {
        if !query.is_searchable() {
            return Err(OrchestratorError::InvalidQuery);
        }

        let (selected, skipped) = self.select_adapters(query);
        let names: Vec<String> = selected
            .iter()
            .map(|a| a.source().name.clone())
            .collect();
        let key = fingerprint(query, &names);

        self.cache
            .get_or_compute(&key, self.cache_ttl, || {
                self.fan_out(query, location, &selected, &skipped, cancel)
            })
            .await
    }

    fn select_adapters(
        &self,
        query: &SearchQuery,
    ) -> (Vec<Arc<dyn MerchantAdapter>>, Vec<String>) {
        let requested = &query.filters.merchants;
        let mut selected = Vec::new();
        let mut skipped = Vec::new();

        for adapter in &self.adapters {
            let source = adapter.source();
            let wanted = requested.is_empty()
                || requested
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(&source.name));
            if source.enabled && wanted {
                selected.push(Arc::clone(adapter));
            } else {
                skipped.push(source.name.clone());
            }
        }

        (selected, skipped)
    }

    async fn fan_out(
        &self,
        query: &SearchQuery,
        location: Option<&LocationContext>,
        selected: &[Arc<dyn MerchantAdapter>],
        skipped: &[String],
        cancel: &CancellationToken,
    ) -> Result<SearchResult, OrchestratorError> {
        let started = Instant::now();

        // One shared signal: fires on caller cancellation or deadline expiry.
        let token = cancel.child_token();
        let watchdog = {
            let token = token.clone();
            let deadline = self.deadline;
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                tracing::warn!("search deadline expired; cancelling in-flight merchants");
                token.cancel();
            })
        };

        let mut merchant_futures = Vec::with_capacity(selected.len());
        for adapter in selected.iter().map(Arc::clone) {
            let token = token.clone();
            merchant_futures
                .push(async move { self.run_merchant(adapter, query, location, &token).await });
        }
        let reports: Vec<MerchantReport> = stream::iter(merchant_futures)
            .buffer_unordered(selected.len().max(1))
            .collect()
            .await;

        watchdog.abort();

        self.assemble(query, started, reports, skipped, selected.len())
    }

    /// Runs one merchant to completion or cancellation. A task that finishes
    /// after cancellation was requested is discarded (the select is biased
    /// toward the token), so nothing lands in the merge after the reported
    /// elapsed time.
    async fn run_merchant(
        &self,
        adapter: Arc<dyn MerchantAdapter>,
        query: &SearchQuery,
        location: Option<&LocationContext>,
        token: &CancellationToken,
    ) -> MerchantReport {
        let merchant = adapter.source().name.clone();

        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => {
                return MerchantReport {
                    merchant,
                    status: MerchantStatus::TimedOut,
                    listings: Vec::new(),
                    degraded: false,
                };
            }
            outcome = self.process_merchant(&*adapter, query, location, token) => outcome,
        };

        match outcome {
            Ok((listings, skipped_items, degraded)) => MerchantReport {
                merchant,
                status: MerchantStatus::Responded {
                    listings: listings.len(),
                    skipped_items,
                },
                listings,
                degraded,
            },
            Err(AdapterError::Cancelled(_)) => MerchantReport {
                merchant,
                status: MerchantStatus::TimedOut,
                listings: Vec::new(),
                degraded: false,
            },
            Err(error) => {
                tracing::warn!(merchant = %merchant, error = %error, "merchant search failed");
                MerchantReport {
                    merchant,
                    status: MerchantStatus::Failed { kind: error.kind() },
                    listings: Vec::new(),
                    degraded: false,
                }
            }
        }
    }

    async fn process_merchant(
        &self,
        adapter: &dyn MerchantAdapter,
        query: &SearchQuery,
        location: Option<&LocationContext>,
        token: &CancellationToken,
    ) -> Result<(Vec<NormalizedListing>, usize, bool), AdapterError> {
        let batch = adapter.search(query, token).await?;

        let mut listings = Vec::with_capacity(batch.listings.len());
        let mut degraded = false;
        for raw in batch.listings {
            if !passes_filters(&raw, &query.filters) {
                continue;
            }
            let outcome = self.normalizer.normalize(raw, location).await;
            degraded |= outcome.degraded;
            listings.push(outcome.listing);
        }

        Ok((listings, batch.skipped_items, degraded))
    }

    fn assemble(
        &self,
        query: &SearchQuery,
        started: Instant,
        reports: Vec<MerchantReport>,
        skipped: &[String],
        queried: usize,
    ) -> Result<SearchResult, OrchestratorError> {
        let mut statuses = Vec::with_capacity(reports.len() + skipped.len());
        let mut products = Vec::new();
        let mut responded = 0usize;
        let mut degraded = false;

        for report in reports {
            if matches!(report.status, MerchantStatus::Responded { .. }) {
                responded += 1;
            }
            degraded |= report.degraded;
            products.extend(report.listings);
            statuses.push(MerchantStatusEntry {
                merchant: report.merchant,
                status: report.status,
            });
        }
        for name in skipped {
            statuses.push(MerchantStatusEntry {
                merchant: name.clone(),
                status: MerchantStatus::Skipped,
            });
        }
        statuses.sort_by(|a, b| a.merchant.cmp(&b.merchant));

        if responded == 0 {
            return Err(OrchestratorError::AllMerchantsFailed);
        }

        // Merge is by value: ordering is deterministic no matter which
        // merchant finished first.
        products.sort_by(|a, b| {
            a.total_price
                .cmp(&b.total_price)
                .then_with(|| a.merchant.cmp(&b.merchant))
        });

        // Out-of-stock exclusion happens after ranking so stock state never
        // changes relative ordering of what remains.
        if !query.filters.include_out_of_stock {
            products.retain(|l| l.availability != Availability::OutOfStock);
        }

        products.truncate(query.filters.max_results.clamp(1, MAX_RESULTS_CEILING));

        Ok(SearchResult {
            total_results: products.len(),
            search_time: started.elapsed().as_secs_f64(),
            cached: false,
            degraded,
            merchants_queried: queried,
            merchants_responded: responded,
            statuses,
            products,
        })
    }
}

fn passes_filters(raw: &RawListing, filters: &SearchFilters) -> bool {
    if let Some(min) = filters.min_price {
        if raw.base_price < min {
            return false;
        }
    }
    if let Some(max) = filters.max_price {
        if raw.base_price > max {
            return false;
        }
    }
    if let Some(brand) = &filters.brand {
        if !raw.title.to_lowercase().contains(&brand.to_lowercase()) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use pricelens_core::{FetchMode, MerchantSource, SelectorSet};

    use crate::adapter::AdapterBatch;
    use crate::cache::MemoryStore;
    use crate::error::{Cancelled, FetchError};
    use crate::normalize::{RateLookup, RateLookupError, RateQuote};

    fn make_source(name: &str, enabled: bool) -> MerchantSource {
        MerchantSource {
            name: name.to_string(),
            enabled,
            version: "1.0.0".to_string(),
            domain: format!("www.{name}.example"),
            mode: FetchMode::Static,
            search_url: format!("https://www.{name}.example/s?q={{query}}"),
            barcode_url: None,
            supports_barcode: false,
            request_delay_ms: None,
            selectors: SelectorSet {
                container: ".item".to_string(),
                title: ".title".to_string(),
                price: ".price".to_string(),
                image: ".img img".to_string(),
                link: ".title a".to_string(),
                availability: None,
                id_attr: None,
            },
        }
    }

    fn make_raw(merchant: &str, cents: i64, availability: Availability) -> RawListing {
        RawListing {
            merchant: merchant.to_string(),
            merchant_id: None,
            title: format!("{merchant} usb-c cable"),
            base_price: Decimal::new(cents, 2),
            product_url: format!("https://www.{merchant}.example/p/1"),
            image_url: String::new(),
            availability,
            brand: None,
            rating: None,
            review_count: None,
        }
    }

    enum Script {
        Listings(Vec<RawListing>),
        Fail,
        Drift,
        Hang,
    }

    struct MockAdapter {
        source: MerchantSource,
        script: Script,
        calls: Arc<AtomicUsize>,
    }

    impl MockAdapter {
        fn new(name: &str, script: Script) -> Arc<Self> {
            Arc::new(Self {
                source: make_source(name, true),
                script,
                calls: Arc::new(AtomicUsize::new(0)),
            })
        }

        fn disabled(name: &str) -> Arc<Self> {
            Arc::new(Self {
                source: make_source(name, false),
                script: Script::Listings(vec![]),
                calls: Arc::new(AtomicUsize::new(0)),
            })
        }
    }

    #[async_trait]
    impl MerchantAdapter for MockAdapter {
        fn source(&self) -> &MerchantSource {
            &self.source
        }

        async fn search(
            &self,
            _query: &SearchQuery,
            cancel: &CancellationToken,
        ) -> Result<AdapterBatch, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                Script::Listings(listings) => Ok(AdapterBatch {
                    listings: listings.clone(),
                    skipped_items: 0,
                }),
                Script::Fail => Err(AdapterError::Fetch(FetchError::HttpStatus {
                    status: 503,
                    url: "https://example".to_string(),
                })),
                Script::Drift => Err(AdapterError::NoResultsOrStructureChanged),
                Script::Hang => {
                    cancel.cancelled().await;
                    Err(AdapterError::Cancelled(Cancelled))
                }
            }
        }
    }

    /// Rate lookup scripted per merchant: (shipping cents, tax cents).
    struct ScriptedRates(HashMap<String, (i64, i64)>);

    #[async_trait]
    impl RateLookup for ScriptedRates {
        async fn lookup(
            &self,
            merchant: &str,
            _listing: &RawListing,
            _location: Option<&LocationContext>,
        ) -> Result<RateQuote, RateLookupError> {
            let (ship, tax) = self
                .0
                .get(merchant)
                .copied()
                .ok_or_else(|| RateLookupError("no rates scripted".to_string()))?;
            Ok(RateQuote {
                shipping_cost: Decimal::new(ship, 2),
                tax: Decimal::new(tax, 2),
            })
        }
    }

    fn zero_rates() -> Arc<ScriptedRates> {
        Arc::new(ScriptedRates(HashMap::new()))
    }

    fn orchestrator(
        adapters: Vec<Arc<dyn MerchantAdapter>>,
        rates: Arc<dyn RateLookup>,
        deadline: Duration,
    ) -> SearchOrchestrator {
        SearchOrchestrator::new(
            adapters,
            PriceNormalizer::new(rates),
            ResultCache::new(Arc::new(MemoryStore::new())),
            deadline,
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let orch = orchestrator(vec![], zero_rates(), Duration::from_secs(5));
        let err = orch
            .search(&SearchQuery::new("  "), None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidQuery));
    }

    #[tokio::test]
    async fn barcode_only_query_is_accepted() {
        let a = MockAdapter::new(
            "shopco",
            Script::Listings(vec![make_raw("shopco", 500, Availability::InStock)]),
        );
        let orch = orchestrator(vec![a], zero_rates(), Duration::from_secs(5));
        let mut query = SearchQuery::new("");
        query.barcode = Some("012345678905".to_string());
        // Rates are unscripted, so this also exercises degraded totals.
        let result = orch
            .search(&query, None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.total_results, 1);
        assert!(result.degraded);
    }

    #[tokio::test]
    async fn ranks_by_total_price_across_merchants() {
        // The worked example: A 5.00+2.00+0.50 = 7.50, B 4.00+3.00+0.40 = 7.40.
        let a = MockAdapter::new(
            "merchant-a",
            Script::Listings(vec![make_raw("merchant-a", 500, Availability::InStock)]),
        );
        let b = MockAdapter::new(
            "merchant-b",
            Script::Listings(vec![make_raw("merchant-b", 400, Availability::InStock)]),
        );
        let rates = Arc::new(ScriptedRates(HashMap::from([
            ("merchant-a".to_string(), (200, 50)),
            ("merchant-b".to_string(), (300, 40)),
        ])));
        let orch = orchestrator(vec![a, b], rates, Duration::from_secs(5));

        let result = orch
            .search(
                &SearchQuery::new("usb-c cable"),
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.total_results, 2);
        assert_eq!(result.products[0].merchant, "merchant-b");
        assert_eq!(result.products[0].total_price, Decimal::new(740, 2));
        assert_eq!(result.products[1].merchant, "merchant-a");
        assert_eq!(result.products[1].total_price, Decimal::new(750, 2));
        assert!(!result.degraded);
    }

    #[tokio::test]
    async fn equal_totals_tie_break_on_merchant_name() {
        let b = MockAdapter::new(
            "beta",
            Script::Listings(vec![make_raw("beta", 500, Availability::InStock)]),
        );
        let a = MockAdapter::new(
            "alpha",
            Script::Listings(vec![make_raw("alpha", 500, Availability::InStock)]),
        );
        let rates = Arc::new(ScriptedRates(HashMap::from([
            ("alpha".to_string(), (0, 0)),
            ("beta".to_string(), (0, 0)),
        ])));
        // Register beta first so input order differs from expected output.
        let orch = orchestrator(vec![b, a], rates, Duration::from_secs(5));

        let result = orch
            .search(
                &SearchQuery::new("usb-c cable"),
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.products[0].merchant, "alpha");
        assert_eq!(result.products[1].merchant, "beta");
    }

    #[tokio::test]
    async fn partial_failure_returns_survivors_and_names_the_dead() {
        let ok1 = MockAdapter::new(
            "alpha",
            Script::Listings(vec![make_raw("alpha", 500, Availability::InStock)]),
        );
        let ok2 = MockAdapter::new(
            "gamma",
            Script::Listings(vec![make_raw("gamma", 700, Availability::InStock)]),
        );
        let ok3 = MockAdapter::new(
            "epsilon",
            Script::Listings(vec![make_raw("epsilon", 600, Availability::InStock)]),
        );
        let bad1 = MockAdapter::new("beta", Script::Fail);
        let bad2 = MockAdapter::new("delta", Script::Drift);
        let rates = Arc::new(ScriptedRates(HashMap::from([
            ("alpha".to_string(), (0, 0)),
            ("gamma".to_string(), (0, 0)),
            ("epsilon".to_string(), (0, 0)),
        ])));
        let orch = orchestrator(vec![ok1, bad1, ok2, bad2, ok3], rates, Duration::from_secs(5));

        let result = orch
            .search(
                &SearchQuery::new("usb-c cable"),
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.merchants_queried, 5);
        assert_eq!(result.merchants_responded, 3);
        assert_eq!(result.total_results, 3);
        let merchants: Vec<_> = result.products.iter().map(|p| &p.merchant).collect();
        assert_eq!(merchants, ["alpha", "epsilon", "gamma"]);

        let status_of = |name: &str| {
            result
                .statuses
                .iter()
                .find(|s| s.merchant == name)
                .map(|s| s.status.clone())
                .expect("status present")
        };
        assert_eq!(
            status_of("beta"),
            MerchantStatus::Failed {
                kind: "http_status_503".to_string()
            }
        );
        assert_eq!(
            status_of("delta"),
            MerchantStatus::Failed {
                kind: "structure_changed".to_string()
            }
        );
    }

    #[tokio::test]
    async fn all_failures_surface_as_request_error() {
        let bad1 = MockAdapter::new("alpha", Script::Fail);
        let bad2 = MockAdapter::new("beta", Script::Drift);
        let orch = orchestrator(vec![bad1, bad2], zero_rates(), Duration::from_secs(5));

        let err = orch
            .search(
                &SearchQuery::new("usb-c cable"),
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::AllMerchantsFailed));
    }

    #[tokio::test]
    async fn empty_listing_set_is_a_success_not_a_failure() {
        let empty = MockAdapter::new("alpha", Script::Listings(vec![]));
        let orch = orchestrator(vec![empty], zero_rates(), Duration::from_secs(5));

        let result = orch
            .search(
                &SearchQuery::new("usb-c cable"),
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.total_results, 0);
        assert_eq!(result.merchants_responded, 1);
    }

    #[tokio::test]
    async fn hung_merchant_cannot_push_past_the_deadline() {
        let hang = MockAdapter::new("slowco", Script::Hang);
        let ok = MockAdapter::new(
            "fastco",
            Script::Listings(vec![make_raw("fastco", 500, Availability::InStock)]),
        );
        let rates = Arc::new(ScriptedRates(HashMap::from([(
            "fastco".to_string(),
            (0, 0),
        )])));
        let orch = orchestrator(vec![hang, ok], rates, Duration::from_millis(200));

        let started = Instant::now();
        let result = orch
            .search(
                &SearchQuery::new("usb-c cable"),
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(
            elapsed < Duration::from_secs(2),
            "deadline did not bound the search: {elapsed:?}"
        );
        assert_eq!(result.total_results, 1);
        assert_eq!(result.products[0].merchant, "fastco");
        let slow = result
            .statuses
            .iter()
            .find(|s| s.merchant == "slowco")
            .unwrap();
        assert_eq!(slow.status, MerchantStatus::TimedOut);
    }

    #[tokio::test]
    async fn caller_cancellation_propagates_like_the_deadline() {
        let hang = MockAdapter::new("slowco", Script::Hang);
        let orch = orchestrator(vec![hang], zero_rates(), Duration::from_secs(30));

        let token = CancellationToken::new();
        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                token.cancel();
            })
        };

        let started = Instant::now();
        let outcome = orch
            .search(&SearchQuery::new("usb-c cable"), None, &token)
            .await;
        canceller.await.unwrap();

        assert!(
            started.elapsed() < Duration::from_secs(5),
            "caller cancellation did not abort the search"
        );
        // Nothing responded, so the cancelled query reports total failure.
        assert!(matches!(
            outcome,
            Err(OrchestratorError::AllMerchantsFailed)
        ));
    }

    #[tokio::test]
    async fn out_of_stock_excluded_when_requested() {
        let mixed = MockAdapter::new(
            "shopco",
            Script::Listings(vec![
                make_raw("shopco", 300, Availability::OutOfStock),
                make_raw("shopco", 500, Availability::InStock),
            ]),
        );
        let rates = Arc::new(ScriptedRates(HashMap::from([(
            "shopco".to_string(),
            (0, 0),
        )])));
        let orch = orchestrator(vec![mixed], rates, Duration::from_secs(5));

        let mut query = SearchQuery::new("usb-c cable");
        query.filters.include_out_of_stock = false;
        let result = orch
            .search(&query, None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.total_results, 1);
        assert!(result
            .products
            .iter()
            .all(|p| p.availability != Availability::OutOfStock));
    }

    #[tokio::test]
    async fn out_of_stock_kept_by_default_and_ranked_by_price() {
        let mixed = MockAdapter::new(
            "shopco",
            Script::Listings(vec![
                make_raw("shopco", 300, Availability::OutOfStock),
                make_raw("shopco", 500, Availability::InStock),
            ]),
        );
        let rates = Arc::new(ScriptedRates(HashMap::from([(
            "shopco".to_string(),
            (0, 0),
        )])));
        let orch = orchestrator(vec![mixed], rates, Duration::from_secs(5));

        let result = orch
            .search(
                &SearchQuery::new("usb-c cable"),
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.total_results, 2);
        assert_eq!(result.products[0].availability, Availability::OutOfStock);
    }

    #[tokio::test]
    async fn price_and_brand_filters_drop_listings_before_ranking() {
        let shop = MockAdapter::new(
            "shopco",
            Script::Listings(vec![
                make_raw("shopco", 500, Availability::InStock),
                make_raw("shopco", 5000, Availability::InStock),
            ]),
        );
        let rates = Arc::new(ScriptedRates(HashMap::from([(
            "shopco".to_string(),
            (0, 0),
        )])));
        let orch = orchestrator(vec![shop], rates, Duration::from_secs(5));

        let mut query = SearchQuery::new("usb-c cable");
        query.filters.max_price = Some(Decimal::new(1000, 2));
        let result = orch
            .search(&query, None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.total_results, 1);
        assert_eq!(result.products[0].base_price, Decimal::new(500, 2));

        let mut query = SearchQuery::new("usb-c cable");
        query.filters.brand = Some("nosuchbrand".to_string());
        let result = orch
            .search(&query, None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.total_results, 0);
    }

    #[tokio::test]
    async fn max_results_truncates_after_ranking() {
        let listings: Vec<RawListing> = (1..=5)
            .map(|i| make_raw("shopco", i * 100, Availability::InStock))
            .collect();
        let shop = MockAdapter::new("shopco", Script::Listings(listings));
        let rates = Arc::new(ScriptedRates(HashMap::from([(
            "shopco".to_string(),
            (0, 0),
        )])));
        let orch = orchestrator(vec![shop], rates, Duration::from_secs(5));

        let mut query = SearchQuery::new("usb-c cable");
        query.filters.max_results = 2;
        let result = orch
            .search(&query, None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.total_results, 2);
        assert_eq!(result.products[0].base_price, Decimal::new(100, 2));
        assert_eq!(result.products[1].base_price, Decimal::new(200, 2));
    }

    #[tokio::test]
    async fn disabled_and_unrequested_merchants_are_skipped_not_queried() {
        let wanted = MockAdapter::new(
            "alpha",
            Script::Listings(vec![make_raw("alpha", 500, Availability::InStock)]),
        );
        let other = MockAdapter::new(
            "beta",
            Script::Listings(vec![make_raw("beta", 400, Availability::InStock)]),
        );
        let dead = MockAdapter::disabled("gamma");
        let other_calls = Arc::clone(&other.calls);
        let dead_calls = Arc::clone(&dead.calls);
        let rates = Arc::new(ScriptedRates(HashMap::from([(
            "alpha".to_string(),
            (0, 0),
        )])));
        let orch = orchestrator(vec![wanted, other, dead], rates, Duration::from_secs(5));

        let mut query = SearchQuery::new("usb-c cable");
        query.filters.merchants = vec!["Alpha".to_string()];
        let result = orch
            .search(&query, None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.merchants_queried, 1);
        assert_eq!(other_calls.load(Ordering::SeqCst), 0);
        assert_eq!(dead_calls.load(Ordering::SeqCst), 0);
        let status_of = |name: &str| {
            result
                .statuses
                .iter()
                .find(|s| s.merchant == name)
                .map(|s| s.status.clone())
                .unwrap()
        };
        assert_eq!(status_of("beta"), MerchantStatus::Skipped);
        assert_eq!(status_of("gamma"), MerchantStatus::Skipped);
    }

    #[tokio::test]
    async fn statuses_are_sorted_by_merchant_name() {
        let c = MockAdapter::new("charlie", Script::Listings(vec![]));
        let a = MockAdapter::new("alpha", Script::Fail);
        let b = MockAdapter::new("bravo", Script::Listings(vec![]));
        let orch = orchestrator(vec![c, a, b], zero_rates(), Duration::from_secs(5));

        let result = orch
            .search(
                &SearchQuery::new("usb-c cable"),
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        let names: Vec<_> = result.statuses.iter().map(|s| s.merchant.clone()).collect();
        assert_eq!(names, ["alpha", "bravo", "charlie"]);
    }
}
