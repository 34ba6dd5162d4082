pub mod adapter;
pub mod cache;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod fingerprint;
pub mod normalize;
pub mod orchestrator;
pub mod rate_limit;
pub mod validate;

pub use adapter::{build_adapters, AdapterBatch, MerchantAdapter, ScrapingAdapter};
pub use cache::{KeyValueStore, MemoryStore, ResultCache};
pub use error::{AdapterError, Cancelled, FetchError, OrchestratorError};
pub use fetch::{FetchedPage, Fetcher, RenderedFetcher, StaticFetcher};
pub use fingerprint::fingerprint;
pub use normalize::{
    EstimatedRates, NormalizedOutcome, PriceNormalizer, RateLookup, RateLookupError, RateQuote,
};
pub use orchestrator::SearchOrchestrator;
pub use rate_limit::RateLimiter;
pub use validate::{QueryValidator, Validation};
