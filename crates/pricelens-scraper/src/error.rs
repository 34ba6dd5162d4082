use thiserror::Error;

/// A wait or request aborted by the caller's cancellation signal.
#[derive(Debug, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Transport-level failures from either fetch strategy.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("render of {url} did not become ready in time")]
    RenderTimeout { url: String },

    #[error("render of {url} failed: {reason}")]
    RenderCrash { url: String, reason: String },
}

impl FetchError {
    /// Short machine-readable tag for status metadata.
    #[must_use]
    pub fn kind(&self) -> String {
        match self {
            FetchError::Network(_) => "network".to_string(),
            FetchError::Timeout { .. } => "timeout".to_string(),
            FetchError::HttpStatus { status, .. } => format!("http_status_{status}"),
            FetchError::RenderTimeout { .. } => "render_timeout".to_string(),
            FetchError::RenderCrash { .. } => "render_crash".to_string(),
        }
    }
}

/// Failures of one merchant's whole search call.
///
/// Individual malformed items never produce an error — they are skipped and
/// counted on the batch. A page where the result selectors match nothing is
/// reported as [`AdapterError::NoResultsOrStructureChanged`]: that is the
/// actionable signal that the site shipped a redesign, distinct from a
/// transient [`AdapterError::Fetch`].
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("result selectors matched nothing; site structure may have changed")]
    NoResultsOrStructureChanged,

    #[error("search cancelled before completion")]
    Cancelled(#[from] Cancelled),
}

impl AdapterError {
    /// Short machine-readable tag for status metadata.
    #[must_use]
    pub fn kind(&self) -> String {
        match self {
            AdapterError::Fetch(e) => e.kind(),
            AdapterError::NoResultsOrStructureChanged => "structure_changed".to_string(),
            AdapterError::Cancelled(_) => "cancelled".to_string(),
        }
    }
}

/// Request-level failures surfaced to the caller. Everything else — partial
/// merchant failures, deadline expiry — is reported inside a successful
/// [`pricelens_core::SearchResult`]'s metadata.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("every queried merchant failed; no results are available")]
    AllMerchantsFailed,

    #[error("query must include search text or a barcode")]
    InvalidQuery,
}
