//! Price normalization onto a common base + shipping + tax basis.
//!
//! Shipping and tax come from an external rate-lookup collaborator behind
//! the [`RateLookup`] port. When that collaborator is unavailable the
//! listing degrades to zero shipping/tax instead of failing — an approximate
//! comparison beats no comparison — and the degradation is flagged so the
//! caller can disclose that totals may be optimistic.
//!
//! All arithmetic is `Decimal`; rounding to whole cents happens once, when
//! `total_price` is produced (inside [`NormalizedListing::from_raw`]).

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use pricelens_core::{LocationContext, NormalizedListing, RawListing};

/// Shipping and tax resolved for one listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateQuote {
    pub shipping_cost: Decimal,
    pub tax: Decimal,
}

#[derive(Debug, Error)]
#[error("rate lookup unavailable: {0}")]
pub struct RateLookupError(pub String);

/// External collaborator resolving shipping and tax for a listing at a
/// location.
#[async_trait]
pub trait RateLookup: Send + Sync {
    /// # Errors
    ///
    /// Returns [`RateLookupError`] when rates cannot be resolved; callers
    /// degrade rather than fail.
    async fn lookup(
        &self,
        merchant: &str,
        listing: &RawListing,
        location: Option<&LocationContext>,
    ) -> Result<RateQuote, RateLookupError>;
}

/// Outcome of normalizing one listing.
#[derive(Debug, Clone)]
pub struct NormalizedOutcome {
    pub listing: NormalizedListing,
    /// True when the rate lookup failed and zeros were substituted.
    pub degraded: bool,
}

pub struct PriceNormalizer {
    rates: Arc<dyn RateLookup>,
}

impl PriceNormalizer {
    #[must_use]
    pub fn new(rates: Arc<dyn RateLookup>) -> Self {
        Self { rates }
    }

    /// Resolves shipping and tax for `raw` and computes its total price.
    pub async fn normalize(
        &self,
        raw: RawListing,
        location: Option<&LocationContext>,
    ) -> NormalizedOutcome {
        match self.rates.lookup(&raw.merchant, &raw, location).await {
            Ok(quote) => NormalizedOutcome {
                listing: NormalizedListing::from_raw(
                    raw,
                    quote.shipping_cost.max(Decimal::ZERO),
                    quote.tax.max(Decimal::ZERO),
                ),
                degraded: false,
            },
            Err(e) => {
                tracing::warn!(merchant = %raw.merchant, error = %e, "rate lookup failed; normalizing without shipping/tax");
                NormalizedOutcome {
                    listing: NormalizedListing::from_raw(raw, Decimal::ZERO, Decimal::ZERO),
                    degraded: true,
                }
            }
        }
    }
}

/// Built-in rate estimates: per-merchant free-shipping thresholds plus US
/// state sales-tax rates keyed by the caller's resolved state.
pub struct EstimatedRates {
    shipping_enabled: bool,
    tax_enabled: bool,
}

impl EstimatedRates {
    #[must_use]
    pub fn new(shipping_enabled: bool, tax_enabled: bool) -> Self {
        Self {
            shipping_enabled,
            tax_enabled,
        }
    }

    fn shipping_for(merchant: &str, base_price: Decimal) -> Decimal {
        let standard = Decimal::new(599, 2);
        let heavy = Decimal::new(799, 2);
        let free = Decimal::ZERO;

        match merchant.to_lowercase().as_str() {
            // Free shipping over $25 on Amazon, $35 on the big-box stores,
            // $50 on Newegg. eBay varies by seller; a flat estimate is used.
            "amazon" => {
                if base_price > Decimal::new(25, 0) {
                    free
                } else {
                    standard
                }
            }
            "walmart" | "target" | "bestbuy" => {
                if base_price > Decimal::new(35, 0) {
                    free
                } else {
                    standard
                }
            }
            "newegg" => {
                if base_price > Decimal::new(50, 0) {
                    free
                } else {
                    heavy
                }
            }
            _ => standard,
        }
    }

    /// Approximate state sales-tax rates; unknown or absent states are
    /// untaxed.
    fn tax_rate(state: &str) -> Decimal {
        match state.to_uppercase().as_str() {
            "AL" | "GA" | "HI" | "NY" | "WY" => Decimal::new(4, 2),
            "AZ" => Decimal::new(56, 3),
            "AR" | "KS" => Decimal::new(65, 3),
            "CA" => Decimal::new(725, 4),
            "CO" => Decimal::new(29, 3),
            "CT" => Decimal::new(635, 4),
            "FL" | "ID" | "IA" | "KY" | "MD" | "MI" | "PA" | "SC" | "VT" | "WV" | "DC" => {
                Decimal::new(6, 2)
            }
            "IL" | "MA" | "TX" => Decimal::new(625, 4),
            "IN" | "MS" | "RI" | "TN" => Decimal::new(7, 2),
            "LA" => Decimal::new(445, 4),
            "ME" | "NE" => Decimal::new(55, 3),
            "MN" => Decimal::new(6875, 5),
            "MO" => Decimal::new(4225, 5),
            "NV" => Decimal::new(685, 4),
            "NJ" => Decimal::new(6625, 5),
            "NM" => Decimal::new(5125, 5),
            "NC" => Decimal::new(475, 4),
            "ND" => Decimal::new(5, 2),
            "OH" => Decimal::new(575, 4),
            "OK" | "SD" => Decimal::new(45, 3),
            "UT" => Decimal::new(61, 3),
            "VA" => Decimal::new(53, 3),
            "WA" => Decimal::new(65, 3),
            "WI" => Decimal::new(5, 2),
            _ => Decimal::ZERO,
        }
    }
}

#[async_trait]
impl RateLookup for EstimatedRates {
    async fn lookup(
        &self,
        merchant: &str,
        listing: &RawListing,
        location: Option<&LocationContext>,
    ) -> Result<RateQuote, RateLookupError> {
        let shipping_cost = if self.shipping_enabled {
            Self::shipping_for(merchant, listing.base_price)
        } else {
            Decimal::ZERO
        };

        let tax = if self.tax_enabled {
            location
                .and_then(|loc| loc.state.as_deref())
                .map(Self::tax_rate)
                .map_or(Decimal::ZERO, |rate| listing.base_price * rate)
        } else {
            Decimal::ZERO
        };

        Ok(RateQuote { shipping_cost, tax })
    }
}
