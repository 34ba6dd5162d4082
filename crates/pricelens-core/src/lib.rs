pub mod app_config;
pub mod config;
pub mod merchants;
pub mod types;

use thiserror::Error;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use merchants::{load_merchants, FetchMode, MerchantSource, MerchantsFile, SelectorSet};
pub use types::{
    Availability, LocationContext, MerchantStatus, MerchantStatusEntry, NormalizedListing,
    RawListing, SearchFilters, SearchQuery, SearchResult,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read merchants file {path}: {source}")]
    MerchantsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse merchants file: {0}")]
    MerchantsFileParse(#[from] serde_yaml::Error),

    #[error("merchants config validation failed: {0}")]
    Validation(String),
}
