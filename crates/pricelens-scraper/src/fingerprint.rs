//! Cache fingerprints: a stable hash of what makes two searches identical.

use sha2::{Digest, Sha256};

use pricelens_core::SearchQuery;

/// Computes the cache fingerprint for a query against a merchant set.
///
/// The hash covers the case-folded trimmed query text (or barcode), every
/// active filter, and the sorted merchant set, so any difference that could
/// change the result set produces a different key. Merchant order is
/// irrelevant by construction.
#[must_use]
pub fn fingerprint(query: &SearchQuery, merchants: &[String]) -> String {
    let mut sorted: Vec<String> = merchants.iter().map(|m| m.to_lowercase()).collect();
    sorted.sort();

    let mut hasher = Sha256::new();
    hasher.update(query.normalized_text());
    hasher.update("\x1f");
    hasher.update(query.barcode().unwrap_or(""));
    hasher.update("\x1f");
    hasher.update(
        query
            .filters
            .min_price
            .map(|p| p.to_string())
            .unwrap_or_default(),
    );
    hasher.update("\x1f");
    hasher.update(
        query
            .filters
            .max_price
            .map(|p| p.to_string())
            .unwrap_or_default(),
    );
    hasher.update("\x1f");
    hasher.update(
        query
            .filters
            .brand
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_default(),
    );
    hasher.update("\x1f");
    hasher.update(if query.filters.include_out_of_stock {
        "1"
    } else {
        "0"
    });
    hasher.update("\x1f");
    hasher.update(query.filters.max_results.to_string());
    hasher.update("\x1f");
    hasher.update(sorted.join(","));

    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn merchants(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn identical_queries_share_a_fingerprint() {
        let a = SearchQuery::new("usb-c cable");
        let b = SearchQuery::new("usb-c cable");
        assert_eq!(
            fingerprint(&a, &merchants(&["ebay", "amazon"])),
            fingerprint(&b, &merchants(&["ebay", "amazon"]))
        );
    }

    #[test]
    fn query_text_is_trimmed_and_case_folded() {
        let a = SearchQuery::new("  USB-C Cable ");
        let b = SearchQuery::new("usb-c cable");
        assert_eq!(
            fingerprint(&a, &merchants(&["ebay"])),
            fingerprint(&b, &merchants(&["ebay"]))
        );
    }

    #[test]
    fn merchant_order_is_irrelevant() {
        let q = SearchQuery::new("usb-c cable");
        assert_eq!(
            fingerprint(&q, &merchants(&["ebay", "amazon"])),
            fingerprint(&q, &merchants(&["amazon", "ebay"]))
        );
    }

    #[test]
    fn merchant_set_changes_the_fingerprint() {
        let q = SearchQuery::new("usb-c cable");
        assert_ne!(
            fingerprint(&q, &merchants(&["ebay"])),
            fingerprint(&q, &merchants(&["ebay", "amazon"]))
        );
    }

    #[test]
    fn filters_change_the_fingerprint() {
        let base = SearchQuery::new("usb-c cable");
        let mut filtered = base.clone();
        filtered.filters.max_price = Some(Decimal::new(2000, 2));
        assert_ne!(
            fingerprint(&base, &merchants(&["ebay"])),
            fingerprint(&filtered, &merchants(&["ebay"]))
        );
    }

    #[test]
    fn barcode_changes_the_fingerprint() {
        let base = SearchQuery::new("usb-c cable");
        let mut with_barcode = base.clone();
        with_barcode.barcode = Some("012345678905".to_string());
        assert_ne!(
            fingerprint(&base, &merchants(&["ebay"])),
            fingerprint(&with_barcode, &merchants(&["ebay"]))
        );
    }

    #[test]
    fn out_of_stock_flag_changes_the_fingerprint() {
        let base = SearchQuery::new("usb-c cable");
        let mut no_oos = base.clone();
        no_oos.filters.include_out_of_stock = false;
        assert_ne!(
            fingerprint(&base, &merchants(&["ebay"])),
            fingerprint(&no_oos, &merchants(&["ebay"]))
        );
    }
}
