//! Headless-browser fetch for JavaScript-rendered result pages.
//!
//! Drives a fresh Chromium session per fetch: navigate, wait for the page to
//! become ready (bounded), give client-side rendering a short settle window,
//! then hand back the rendered DOM. A crashed or wedged browser maps to
//! [`FetchError::RenderCrash`] / [`FetchError::RenderTimeout`] rather than
//! hanging the caller.

use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;

use super::FetchedPage;
use crate::error::FetchError;

pub struct RenderedFetcher {
    /// Upper bound on navigation + readiness wait.
    wait: Duration,
    /// Extra delay after navigation so client-side rendering finishes.
    settle: Duration,
}

impl RenderedFetcher {
    #[must_use]
    pub fn new(wait_secs: u64, settle_ms: u64) -> Self {
        Self {
            wait: Duration::from_secs(wait_secs),
            settle: Duration::from_millis(settle_ms),
        }
    }

    /// Loads `url` in headless Chromium and returns the rendered HTML.
    ///
    /// # Errors
    ///
    /// - [`FetchError::RenderTimeout`] — navigation or readiness exceeded the
    ///   configured wait.
    /// - [`FetchError::RenderCrash`] — the browser failed to launch, crashed,
    ///   or navigation failed outright.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let config = BrowserConfig::builder()
            .build()
            .map_err(|reason| FetchError::RenderCrash {
                url: url.to_string(),
                reason,
            })?;

        let (mut browser, mut handler) =
            Browser::launch(config)
                .await
                .map_err(|e| FetchError::RenderCrash {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

        // The handler stream must be polled for the browser connection to
        // make progress.
        let driver = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let result = self.render(&browser, url).await;

        if let Err(e) = browser.close().await {
            tracing::debug!(error = %e, "browser close failed after render");
        }
        driver.abort();

        result
    }

    async fn render(&self, browser: &Browser, url: &str) -> Result<FetchedPage, FetchError> {
        let timeout_err = || FetchError::RenderTimeout {
            url: url.to_string(),
        };
        let crash_err = |e: chromiumoxide::error::CdpError| FetchError::RenderCrash {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let page = tokio::time::timeout(self.wait, browser.new_page(url))
            .await
            .map_err(|_| timeout_err())?
            .map_err(crash_err)?;

        tokio::time::timeout(self.wait, page.wait_for_navigation())
            .await
            .map_err(|_| timeout_err())?
            .map_err(crash_err)?;

        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }

        let html = page.content().await.map_err(crash_err)?;

        // CDP does not surface the HTTP status of the main document here; a
        // page that rendered is treated as a 200.
        Ok(FetchedPage {
            html,
            status: 200,
            final_url: url.to_string(),
        })
    }
}
