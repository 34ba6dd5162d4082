use crate::app_config::AppConfig;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if any env var value cannot be parsed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files — useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if any env var value cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup — no `set_var`/`remove_var` needed.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        let raw = or_default(var, default);
        match raw.as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: format!("expected true/false, got \"{other}\""),
            }),
        }
    };

    let bind_addr = parse_addr("PRICELENS_BIND_ADDR", "0.0.0.0:8000")?;
    let log_level = or_default("PRICELENS_LOG_LEVEL", "info");
    let merchants_path = PathBuf::from(or_default(
        "PRICELENS_MERCHANTS_PATH",
        "./config/merchants.yaml",
    ));

    let fetch_timeout_secs = parse_u64("PRICELENS_FETCH_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("PRICELENS_USER_AGENT", "pricelens/0.1 (price-comparison)");
    let render_wait_secs = parse_u64("PRICELENS_RENDER_WAIT_SECS", "20")?;
    let render_settle_ms = parse_u64("PRICELENS_RENDER_SETTLE_MS", "2000")?;

    let search_deadline_secs = parse_u64("PRICELENS_SEARCH_DEADLINE_SECS", "60")?;
    let cache_ttl_secs = parse_u64("PRICELENS_CACHE_TTL_SECS", "3600")?;
    let request_delay_ms = parse_u64("PRICELENS_REQUEST_DELAY_MS", "1000")?;
    let request_jitter_ms = parse_u64("PRICELENS_REQUEST_JITTER_MS", "250")?;

    let validation_enabled = parse_bool("PRICELENS_VALIDATION_ENABLED", "true")?;
    let validation_timeout_secs = parse_u64("PRICELENS_VALIDATION_TIMEOUT_SECS", "5")?;
    let validation_cache_ttl_secs = parse_u64("PRICELENS_VALIDATION_CACHE_TTL_SECS", "300")?;

    let geolocation_url = or_default("PRICELENS_GEOLOCATION_URL", "http://ip-api.com");
    let shipping_enabled = parse_bool("PRICELENS_SHIPPING_ENABLED", "true")?;
    let tax_enabled = parse_bool("PRICELENS_TAX_ENABLED", "true")?;

    Ok(AppConfig {
        bind_addr,
        log_level,
        merchants_path,
        fetch_timeout_secs,
        user_agent,
        render_wait_secs,
        render_settle_ms,
        search_deadline_secs,
        cache_ttl_secs,
        request_delay_ms,
        request_jitter_ms,
        validation_enabled,
        validation_timeout_secs,
        validation_cache_ttl_secs,
        geolocation_url,
        shipping_enabled,
        tax_enabled,
    })
}
