//! Advisory query validation backed by DuckDuckGo.
//!
//! Strictly best-effort: the validator estimates whether a query will find
//! anything and offers alternative phrasings for the UI. It never blocks a
//! search — any transport failure yields a permissive verdict — and it is
//! not on the orchestration correctness path. Callers debounce; a superseded
//! call is abandoned through its cancellation token rather than left running.

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;

const SUGGESTION_FETCH_LIMIT: usize = 10;
const SUGGESTION_RETURN_LIMIT: usize = 5;
const CACHE_CLEANUP_THRESHOLD: usize = 1000;

/// The validator's verdict. Stable contract consumed by autocomplete UIs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Validation {
    pub is_valid: bool,
    pub has_results: bool,
    pub suggestions: Vec<String>,
    /// 0.0 to 1.0.
    pub confidence: f64,
}

impl Validation {
    /// Verdict used whenever validation itself fails: allow the search.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            is_valid: true,
            has_results: false,
            suggestions: Vec::new(),
            confidence: 0.5,
        }
    }

    fn rejected() -> Self {
        Self {
            is_valid: false,
            has_results: false,
            suggestions: Vec::new(),
            confidence: 0.0,
        }
    }
}

pub struct QueryValidator {
    client: reqwest::Client,
    autocomplete_url: String,
    instant_answer_url: String,
    cache_ttl: Duration,
    cache: StdMutex<HashMap<String, (Validation, Instant)>>,
}

impl QueryValidator {
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] if the HTTP client cannot be built.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        cache_ttl: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            autocomplete_url: "https://duckduckgo.com/ac".to_string(),
            instant_answer_url: "https://api.duckduckgo.com/".to_string(),
            cache_ttl,
            cache: StdMutex::new(HashMap::new()),
        })
    }

    /// Points the validator at different endpoints. Test hook.
    #[must_use]
    pub fn with_endpoints(
        mut self,
        autocomplete_url: impl Into<String>,
        instant_answer_url: impl Into<String>,
    ) -> Self {
        self.autocomplete_url = autocomplete_url.into();
        self.instant_answer_url = instant_answer_url.into();
        self
    }

    /// Validates a query. Never fails; a blank query is rejected outright,
    /// transport problems produce [`Validation::permissive`], and firing
    /// `cancel` abandons the probes.
    pub async fn validate(&self, query: &str, cancel: &CancellationToken) -> Validation {
        let query = query.trim();
        if query.is_empty() {
            return Validation::rejected();
        }

        if let Some(hit) = self.cached(query) {
            return hit;
        }

        let verdict = tokio::select! {
            biased;
            () = cancel.cancelled() => return Validation::permissive(),
            v = self.probe(query) => v,
        };

        match verdict {
            Some(validation) => {
                self.store(query, validation.clone());
                validation
            }
            None => Validation::permissive(),
        }
    }

    /// Runs both probes; `None` means validation itself failed.
    async fn probe(&self, query: &str) -> Option<Validation> {
        let suggestions = self.fetch_suggestions(query).await;
        let has_results = self.fetch_has_results(query).await;

        let (suggestions, has_results) = match (suggestions, has_results) {
            // Both probes down: nothing to base a verdict on.
            (Err(_), Err(_)) => return None,
            (s, h) => (s.unwrap_or_default(), h.unwrap_or(false)),
        };

        let is_valid = has_results || !suggestions.is_empty();
        let confidence = if has_results {
            0.9
        } else if suggestions.is_empty() {
            0.2
        } else {
            0.7
        };

        let mut suggestions = suggestions;
        suggestions.truncate(SUGGESTION_RETURN_LIMIT);

        Some(Validation {
            is_valid,
            has_results,
            suggestions,
            confidence,
        })
    }

    async fn fetch_suggestions(&self, query: &str) -> Result<Vec<String>, FetchError> {
        let response = self
            .client
            .get(&self.autocomplete_url)
            .query(&[("q", query), ("kl", "us-en")])
            .send()
            .await
            .map_err(FetchError::Network)?;

        let payload: serde_json::Value = response.json().await.map_err(FetchError::Network)?;

        let mut suggestions = Vec::new();
        if let Some(items) = payload.as_array() {
            for item in items {
                let phrase = item
                    .get("phrase")
                    .and_then(serde_json::Value::as_str)
                    .or_else(|| item.as_str());
                if let Some(phrase) = phrase {
                    let phrase = phrase.trim();
                    if !phrase.is_empty() && !phrase.eq_ignore_ascii_case(query) {
                        suggestions.push(phrase.to_string());
                    }
                }
                if suggestions.len() >= SUGGESTION_FETCH_LIMIT {
                    break;
                }
            }
        }
        Ok(suggestions)
    }

    async fn fetch_has_results(&self, query: &str) -> Result<bool, FetchError> {
        let response = self
            .client
            .get(&self.instant_answer_url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(FetchError::Network)?;

        let payload: serde_json::Value = response.json().await.map_err(FetchError::Network)?;

        let has_abstract = payload
            .get("AbstractText")
            .and_then(serde_json::Value::as_str)
            .is_some_and(|s| !s.is_empty());
        let has_answer = payload
            .get("Answer")
            .and_then(serde_json::Value::as_str)
            .is_some_and(|s| !s.is_empty());
        let has_related = payload
            .get("RelatedTopics")
            .and_then(serde_json::Value::as_array)
            .is_some_and(|topics| !topics.is_empty());

        Ok(has_abstract || has_answer || has_related)
    }

    fn cached(&self, query: &str) -> Option<Validation> {
        let mut cache = self.cache.lock().expect("validator cache poisoned");
        match cache.get(query) {
            Some((_, stored_at)) if stored_at.elapsed() >= self.cache_ttl => {
                cache.remove(query);
                None
            }
            Some((validation, _)) => Some(validation.clone()),
            None => None,
        }
    }

    fn store(&self, query: &str, validation: Validation) {
        let mut cache = self.cache.lock().expect("validator cache poisoned");
        cache.insert(query.to_string(), (validation, Instant::now()));

        if cache.len() > CACHE_CLEANUP_THRESHOLD {
            let ttl = self.cache_ttl;
            cache.retain(|_, (_, stored_at)| stored_at.elapsed() < ttl);
        }
    }
}
