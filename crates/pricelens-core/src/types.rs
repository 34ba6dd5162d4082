use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Stock state of a listing as reported by its merchant.
///
/// `Unknown` means the adapter has no way to tell (no availability selector
/// configured), not that the item is suspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    InStock,
    OutOfStock,
    Unknown,
}

/// Filters applied to one search. `merchants` empty means "all enabled".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub merchants: Vec<String>,
    #[serde(default)]
    pub min_price: Option<Decimal>,
    #[serde(default)]
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default = "default_include_out_of_stock")]
    pub include_out_of_stock: bool,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            merchants: Vec::new(),
            min_price: None,
            max_price: None,
            brand: None,
            include_out_of_stock: true,
            max_results: default_max_results(),
        }
    }
}

fn default_include_out_of_stock() -> bool {
    true
}

fn default_max_results() -> usize {
    20
}

/// One submitted search. Free text and barcode are mutually exclusive at use
/// sites: when a barcode is present and a merchant supports barcode lookup,
/// the barcode URL is used instead of the text query. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub filters: SearchFilters,
}

impl SearchQuery {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            barcode: None,
            filters: SearchFilters::default(),
        }
    }

    /// Query text trimmed and case-folded, the canonical form used for
    /// cache fingerprinting.
    #[must_use]
    pub fn normalized_text(&self) -> String {
        self.text.trim().to_lowercase()
    }

    #[must_use]
    pub fn barcode(&self) -> Option<&str> {
        self.barcode.as_deref().map(str::trim).filter(|b| !b.is_empty())
    }

    /// A query is searchable when it has non-blank text or a barcode.
    #[must_use]
    pub fn is_searchable(&self) -> bool {
        !self.normalized_text().is_empty() || self.barcode().is_some()
    }
}

/// A merchant-scoped result before price normalization. Owned by the adapter
/// that produced it until handed to the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    pub merchant: String,
    pub merchant_id: Option<String>,
    pub title: String,
    pub base_price: Decimal,
    pub product_url: String,
    pub image_url: String,
    pub availability: Availability,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub review_count: Option<u32>,
}

/// A listing with shipping and tax resolved onto a common basis.
/// `total_price` is the sole sort key for final ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedListing {
    pub merchant: String,
    pub merchant_id: Option<String>,
    pub title: String,
    pub base_price: Decimal,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    pub total_price: Decimal,
    pub product_url: String,
    pub image_url: String,
    pub availability: Availability,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub review_count: Option<u32>,
}

impl NormalizedListing {
    /// Combines a raw listing with resolved shipping and tax.
    ///
    /// Rounding to the nearest cent (half-up) happens here and only here —
    /// intermediate amounts are carried exact so repeated sums cannot drift.
    #[must_use]
    pub fn from_raw(raw: RawListing, shipping_cost: Decimal, tax: Decimal) -> Self {
        let total_price = (raw.base_price + shipping_cost + tax)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        Self {
            merchant: raw.merchant,
            merchant_id: raw.merchant_id,
            title: raw.title,
            base_price: raw.base_price,
            shipping_cost,
            tax,
            total_price,
            product_url: raw.product_url,
            image_url: raw.image_url,
            availability: raw.availability,
            brand: raw.brand,
            rating: raw.rating,
            review_count: raw.review_count,
        }
    }
}

/// Outcome of one merchant's part in a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MerchantStatus {
    /// The merchant answered; an empty listing count is still a success.
    Responded {
        listings: usize,
        /// Items dropped because an individual field failed to parse.
        skipped_items: usize,
    },
    /// The merchant did not answer before the global deadline.
    TimedOut,
    Failed {
        kind: String,
    },
    /// The merchant exists but was not part of the requested set, or is
    /// disabled in configuration.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantStatusEntry {
    pub merchant: String,
    #[serde(flatten)]
    pub status: MerchantStatus,
}

/// The final, immutable answer to one search. Also the value serialized
/// into the result cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Ascending by `total_price`; ties broken by merchant name.
    pub products: Vec<NormalizedListing>,
    pub total_results: usize,
    /// Wall-clock seconds the search took.
    pub search_time: f64,
    pub cached: bool,
    /// True when shipping/tax could not be resolved for at least one listing
    /// and totals may be optimistic.
    pub degraded: bool,
    pub merchants_queried: usize,
    pub merchants_responded: usize,
    pub statuses: Vec<MerchantStatusEntry>,
}

/// Resolved caller location, produced upstream by the geolocation
/// collaborator. Treated as opaque context by the orchestration core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationContext {
    pub country: Option<String>,
    pub region: Option<String>,
    /// Two-letter state/province code used for tax lookup.
    pub state: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
}
