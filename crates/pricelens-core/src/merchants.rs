use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Which transport a merchant's adapter uses. Sites that only render their
/// result grid client-side must be configured as `Rendered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    Static,
    Rendered,
}

impl std::fmt::Display for FetchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchMode::Static => write!(f, "static"),
            FetchMode::Rendered => write!(f, "rendered"),
        }
    }
}

/// CSS selectors used to lift listings out of a merchant's result page.
///
/// `availability` is optional: merchants without it cannot detect
/// out-of-stock items and report [`crate::Availability::Unknown`].
/// `id_attr` names the container attribute carrying the merchant-assigned
/// product id (e.g. `data-asin` on Amazon).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorSet {
    pub container: String,
    pub title: String,
    pub price: String,
    pub image: String,
    pub link: String,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub id_attr: Option<String>,
}

/// One configured scrape source. Loaded at process start from
/// `config/merchants.yaml`; read-only at query time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantSource {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_version")]
    pub version: String,
    pub domain: String,
    pub mode: FetchMode,
    /// Search URL template; `{query}` is replaced with the encoded query.
    pub search_url: String,
    /// Barcode lookup URL template; `{barcode}` is replaced verbatim.
    #[serde(default)]
    pub barcode_url: Option<String>,
    #[serde(default)]
    pub supports_barcode: bool,
    /// Per-merchant courtesy delay override, in milliseconds.
    #[serde(default)]
    pub request_delay_ms: Option<u64>,
    pub selectors: SelectorSet,
}

impl MerchantSource {
    /// Base URL used to resolve relative product/image links.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("https://{}", self.domain)
    }

    /// Whether this source can tell out-of-stock listings apart from
    /// in-stock ones.
    #[must_use]
    pub fn detects_out_of_stock(&self) -> bool {
        self.selectors.availability.is_some()
    }
}

fn default_enabled() -> bool {
    true
}

fn default_version() -> String {
    "1.0.0".to_string()
}

#[derive(Debug, Deserialize)]
pub struct MerchantsFile {
    pub merchants: Vec<MerchantSource>,
}

/// Load and validate the merchant catalog from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_merchants(path: &Path) -> Result<MerchantsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::MerchantsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let merchants_file: MerchantsFile = serde_yaml::from_str(&content)?;

    validate_merchants(&merchants_file)?;

    Ok(merchants_file)
}

fn validate_merchants(file: &MerchantsFile) -> Result<(), ConfigError> {
    let mut seen_names = HashSet::new();

    for merchant in &file.merchants {
        if merchant.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "merchant name must be non-empty".to_string(),
            ));
        }

        if merchant.domain.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "merchant '{}' has an empty domain",
                merchant.name
            )));
        }

        if !seen_names.insert(merchant.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate merchant name: '{}'",
                merchant.name
            )));
        }

        if !merchant.search_url.contains("{query}") {
            return Err(ConfigError::Validation(format!(
                "merchant '{}' search_url is missing the {{query}} placeholder",
                merchant.name
            )));
        }

        match (&merchant.barcode_url, merchant.supports_barcode) {
            (Some(url), true) => {
                if !url.contains("{barcode}") {
                    return Err(ConfigError::Validation(format!(
                        "merchant '{}' barcode_url is missing the {{barcode}} placeholder",
                        merchant.name
                    )));
                }
            }
            (Some(_), false) => {
                return Err(ConfigError::Validation(format!(
                    "merchant '{}' has a barcode_url but supports_barcode is false",
                    merchant.name
                )));
            }
            (None, true) => {
                return Err(ConfigError::Validation(format!(
                    "merchant '{}' claims barcode support but has no barcode_url",
                    merchant.name
                )));
            }
            (None, false) => {}
        }
    }

    Ok(())
}
