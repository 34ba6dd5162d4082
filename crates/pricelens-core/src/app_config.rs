use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub merchants_path: PathBuf,
    /// Request timeout for static (non-rendered) fetches.
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    /// Upper bound on how long a rendered fetch may wait for navigation.
    pub render_wait_secs: u64,
    /// Extra settle time after navigation so client-side rendering finishes.
    pub render_settle_ms: u64,
    /// Wall-clock budget for one whole search, across all merchants.
    pub search_deadline_secs: u64,
    pub cache_ttl_secs: u64,
    /// Courtesy delay between consecutive requests to the same domain, used
    /// when a merchant does not configure its own.
    pub request_delay_ms: u64,
    /// Random 0..=N ms added on top of the courtesy delay.
    pub request_jitter_ms: u64,
    pub validation_enabled: bool,
    pub validation_timeout_secs: u64,
    pub validation_cache_ttl_secs: u64,
    pub geolocation_url: String,
    pub shipping_enabled: bool,
    pub tax_enabled: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("merchants_path", &self.merchants_path)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("render_wait_secs", &self.render_wait_secs)
            .field("render_settle_ms", &self.render_settle_ms)
            .field("search_deadline_secs", &self.search_deadline_secs)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("request_delay_ms", &self.request_delay_ms)
            .field("request_jitter_ms", &self.request_jitter_ms)
            .field("validation_enabled", &self.validation_enabled)
            .field("validation_timeout_secs", &self.validation_timeout_secs)
            .field(
                "validation_cache_ttl_secs",
                &self.validation_cache_ttl_secs,
            )
            .field("geolocation_url", &self.geolocation_url)
            .field("shipping_enabled", &self.shipping_enabled)
            .field("tax_enabled", &self.tax_enabled)
            .finish()
    }
}
