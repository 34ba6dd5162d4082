//! Selector-driven extraction helpers shared by all merchant adapters.
//!
//! Price parsing uses manual character scanning rather than `regex`: the
//! formats are simple (`$19.99`, `1,234.56`, `$5.99 to $12.99`) and the first
//! number wins.

use rust_decimal::{Decimal, RoundingStrategy};
use scraper::{ElementRef, Selector};

use pricelens_core::Availability;

/// Parses the first price found in a text fragment.
///
/// Currency symbols and thousands separators are ignored; ranges like
/// `"$5.99 to $12.99"` yield the lower bound. The result is rounded half-up
/// to whole cents. Returns `None` when no digits are present.
pub(crate) fn parse_price(text: &str) -> Option<Decimal> {
    let cleaned = text.replace(',', "");
    let mut number = String::new();
    let mut seen_digit = false;
    let mut seen_dot = false;

    for c in cleaned.chars() {
        if c.is_ascii_digit() {
            number.push(c);
            seen_digit = true;
        } else if c == '.' && seen_digit && !seen_dot {
            number.push(c);
            seen_dot = true;
        } else if seen_digit {
            break;
        }
    }

    let number = number.trim_end_matches('.');
    if number.is_empty() {
        return None;
    }

    number
        .parse::<Decimal>()
        .ok()
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Concatenated, whitespace-trimmed text content of an element.
pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Text of the first match for `selector` inside `scope`, if any.
pub(crate) fn select_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty())
}

/// Resolves a possibly-relative URL against a merchant's base URL.
pub(crate) fn resolve_url(url: &str, base: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    if let Some(rest) = url.strip_prefix("//") {
        return format!("https://{rest}");
    }
    if url.starts_with('/') {
        return format!("{}{}", base.trim_end_matches('/'), url);
    }
    format!("{}/{}", base.trim_end_matches('/'), url)
}

/// `href` of the first match for `selector`, resolved against `base`.
pub(crate) fn select_link(scope: ElementRef<'_>, selector: &Selector, base: &str) -> String {
    scope
        .select(selector)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(|href| resolve_url(href, base))
        .unwrap_or_default()
}

/// Image URL of the first match for `selector`, preferring `src` and falling
/// back to the lazy-loading `data-src` attribute.
pub(crate) fn select_image(scope: ElementRef<'_>, selector: &Selector, base: &str) -> String {
    scope
        .select(selector)
        .next()
        .and_then(|el| {
            el.value()
                .attr("src")
                .filter(|s| !s.is_empty())
                .or_else(|| el.value().attr("data-src"))
        })
        .map(|src| resolve_url(src, base))
        .unwrap_or_default()
}

/// Maps an availability snippet to a stock state.
///
/// "limited" wording still counts as in stock — the item is purchasable.
pub(crate) fn availability_from_text(text: &str) -> Availability {
    let lower = text.to_lowercase();
    if ["out of stock", "sold out", "unavailable"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        Availability::OutOfStock
    } else {
        Availability::InStock
    }
}
