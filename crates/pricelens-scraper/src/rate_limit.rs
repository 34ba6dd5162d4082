//! Per-domain courtesy limiter.
//!
//! Each domain gets its own gate; independent domains never serialize each
//! other. Waiters for the same domain queue FIFO (tokio's `Mutex` hands the
//! lock out in acquisition order) and each is released at least the
//! configured interval after the previously *released* request — spacing is
//! measured release-to-release, so a burst of simultaneous arrivals cannot
//! compress the gaps.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Cancelled;

struct DomainGate {
    interval: Duration,
    last_release: Mutex<Option<Instant>>,
}

pub struct RateLimiter {
    default_interval: Duration,
    jitter: Duration,
    gates: StdMutex<HashMap<String, Arc<DomainGate>>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(default_interval: Duration, jitter: Duration) -> Self {
        Self {
            default_interval,
            jitter,
            gates: StdMutex::new(HashMap::new()),
        }
    }

    /// Pins a per-domain interval, overriding the default for that domain.
    ///
    /// Intended for startup wiring; has no effect on a domain whose gate was
    /// already created by an earlier `acquire`.
    pub fn register(&self, domain: &str, interval: Duration) {
        let mut gates = self.gates.lock().expect("rate limiter gates poisoned");
        gates
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(DomainGate {
                interval,
                last_release: Mutex::new(None),
            }));
    }

    /// Suspends until it is safe to issue the next request to `domain`.
    ///
    /// Waiters are released in arrival order, each at least the domain's
    /// interval (plus jitter) after the previous release. Never fails on its
    /// own; `cancel` aborts the wait.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if `cancel` fires while queued or waiting.
    pub async fn acquire(
        &self,
        domain: &str,
        cancel: &CancellationToken,
    ) -> Result<(), Cancelled> {
        let gate = self.gate(domain);

        let mut last_release = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Cancelled),
            guard = gate.last_release.lock() => guard,
        };

        if let Some(previous) = *last_release {
            let earliest = previous + gate.interval + self.random_jitter();
            let wait = earliest.saturating_duration_since(Instant::now());
            if !wait.is_zero() {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(Cancelled),
                    () = tokio::time::sleep(wait) => {}
                }
            }
        }

        *last_release = Some(Instant::now());
        Ok(())
    }

    fn gate(&self, domain: &str) -> Arc<DomainGate> {
        let mut gates = self.gates.lock().expect("rate limiter gates poisoned");
        Arc::clone(gates.entry(domain.to_string()).or_insert_with(|| {
            Arc::new(DomainGate {
                interval: self.default_interval,
                last_release: Mutex::new(None),
            })
        }))
    }

    fn random_jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(interval_ms: u64) -> RateLimiter {
        RateLimiter::new(Duration::from_millis(interval_ms), Duration::ZERO)
    }

    #[tokio::test]
    async fn first_acquire_is_immediate() {
        let limiter = limiter(500);
        let token = CancellationToken::new();
        let start = Instant::now();
        limiter.acquire("a.example", &token).await.unwrap();
        assert!(
            start.elapsed() < Duration::from_millis(100),
            "first acquire should not wait"
        );
    }

    #[tokio::test]
    async fn consecutive_acquires_are_spaced_by_interval() {
        let limiter = limiter(80);
        let token = CancellationToken::new();
        limiter.acquire("a.example", &token).await.unwrap();
        let start = Instant::now();
        limiter.acquire("a.example", &token).await.unwrap();
        assert!(
            start.elapsed() >= Duration::from_millis(80),
            "second acquire released after only {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn spacing_is_release_to_release_for_simultaneous_arrivals() {
        let limiter = Arc::new(limiter(60));
        let token = CancellationToken::new();
        let start = Instant::now();

        let a = {
            let limiter = Arc::clone(&limiter);
            let token = token.clone();
            tokio::spawn(async move {
                limiter.acquire("a.example", &token).await.unwrap();
                start.elapsed()
            })
        };
        let b = {
            let limiter = Arc::clone(&limiter);
            let token = token.clone();
            tokio::spawn(async move {
                limiter.acquire("a.example", &token).await.unwrap();
                start.elapsed()
            })
        };
        let c = {
            let limiter = Arc::clone(&limiter);
            let token = token.clone();
            tokio::spawn(async move {
                limiter.acquire("a.example", &token).await.unwrap();
                start.elapsed()
            })
        };

        let mut releases = vec![a.await.unwrap(), b.await.unwrap(), c.await.unwrap()];
        releases.sort();
        assert!(
            releases[1] >= releases[0] + Duration::from_millis(55),
            "second release too close: {releases:?}"
        );
        assert!(
            releases[2] >= releases[1] + Duration::from_millis(55),
            "third release too close: {releases:?}"
        );
    }

    #[tokio::test]
    async fn independent_domains_do_not_serialize() {
        let limiter = limiter(500);
        let token = CancellationToken::new();
        limiter.acquire("a.example", &token).await.unwrap();
        let start = Instant::now();
        limiter.acquire("b.example", &token).await.unwrap();
        assert!(
            start.elapsed() < Duration::from_millis(100),
            "different domain should not wait behind a.example"
        );
    }

    #[tokio::test]
    async fn registered_interval_overrides_default() {
        let limiter = RateLimiter::new(Duration::from_millis(500), Duration::ZERO);
        limiter.register("fast.example", Duration::from_millis(10));
        let token = CancellationToken::new();
        limiter.acquire("fast.example", &token).await.unwrap();
        let start = Instant::now();
        limiter.acquire("fast.example", &token).await.unwrap();
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(10), "waited {waited:?}");
        assert!(
            waited < Duration::from_millis(250),
            "per-domain override ignored, waited {waited:?}"
        );
    }

    #[tokio::test]
    async fn cancellation_aborts_the_wait() {
        let limiter = limiter(5_000);
        let token = CancellationToken::new();
        limiter.acquire("a.example", &token).await.unwrap();

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                token.cancel();
            })
        };

        let start = Instant::now();
        let result = limiter.acquire("a.example", &token).await;
        canceller.await.unwrap();

        assert!(result.is_err(), "expected Cancelled");
        assert!(
            start.elapsed() < Duration::from_millis(500),
            "cancellation should not wait out the interval"
        );
    }

    #[tokio::test]
    async fn already_cancelled_token_fails_fast() {
        let limiter = limiter(5_000);
        let token = CancellationToken::new();
        token.cancel();
        let result = limiter.acquire("a.example", &token).await;
        assert!(result.is_err());
    }
}
