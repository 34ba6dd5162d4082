//! Fetch strategies: lightweight HTTP and headless-browser rendering.
//!
//! Which strategy a merchant uses is a static configuration choice
//! ([`pricelens_core::FetchMode`]); sites that assemble their result grid
//! client-side must be configured as rendered.

mod rendered;

use std::time::Duration;

use reqwest::Client;

use crate::error::FetchError;

pub use rendered::RenderedFetcher;

/// A fetched result page, after any rendering.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub html: String,
    pub status: u16,
    pub final_url: String,
}

/// Plain HTTP fetch: one GET with a configured user-agent and timeout.
pub struct StaticFetcher {
    client: Client,
}

impl StaticFetcher {
    /// Creates a `StaticFetcher` with the given request timeout and
    /// `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] if the underlying `reqwest::Client`
    /// cannot be constructed (e.g., invalid TLS config).
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// Fetches `url` and returns the response body.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Timeout`] — the request exceeded the configured timeout.
    /// - [`FetchError::HttpStatus`] — any non-2xx response.
    /// - [`FetchError::Network`] — connection or TLS failure.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| classify(e, url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let final_url = response.url().to_string();
        let html = response.text().await.map_err(|e| classify(e, url))?;

        Ok(FetchedPage {
            html,
            status: status.as_u16(),
            final_url,
        })
    }
}

fn classify(error: reqwest::Error, url: &str) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network(error)
    }
}

/// The closed set of transports an adapter can be configured with.
pub enum Fetcher {
    Static(StaticFetcher),
    Rendered(RenderedFetcher),
}

impl Fetcher {
    /// Fetches `url` with whichever strategy this fetcher wraps.
    ///
    /// # Errors
    ///
    /// Propagates the wrapped strategy's [`FetchError`].
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        match self {
            Fetcher::Static(f) => f.fetch(url).await,
            Fetcher::Rendered(f) => f.fetch(url).await,
        }
    }
}
