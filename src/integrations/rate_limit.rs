//! Sliding-window request limiter keyed by client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Client count above which idle buckets are swept on the next request.
const PRUNE_THRESHOLD: usize = 10_000;

/// Outcome of [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

/// At most `max_requests` per client within any `window`.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
        }
    }

    /// Record a request from `key` if it is within the limit.
    pub fn check(&self, key: &str) -> RateDecision {
        let now = Instant::now();
        let window = self.window;

        if self.buckets.len() > PRUNE_THRESHOLD {
            self.prune(now);
        }

        let mut entry = self.buckets.entry(key.to_string()).or_default();
        entry.retain(|instant| now.duration_since(*instant) < window);

        if entry.len() as u32 >= self.max_requests {
            let wait = entry
                .first()
                .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(window);
            return RateDecision::Limited {
                retry_after_secs: wait.as_secs_f64().ceil().max(1.0) as u64,
            };
        }

        entry.push(now);
        RateDecision::Allowed {
            remaining: self.max_requests - entry.len() as u32,
        }
    }

    fn prune(&self, now: Instant) {
        let window = self.window;
        self.buckets.retain(|_, hits| {
            hits.retain(|instant| now.duration_since(*instant) < window);
            !hits.is_empty()
        });
        log::debug!("🧹 Rate limiter pruned to {} clients", self.buckets.len());
    }

    pub fn limit(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Clients currently tracked.
    pub fn tracked(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_per_key() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);

        assert_eq!(limiter.check("a"), RateDecision::Allowed { remaining: 1 });
        assert_eq!(limiter.check("a"), RateDecision::Allowed { remaining: 0 });
        assert!(matches!(
            limiter.check("a"),
            RateDecision::Limited { retry_after_secs } if (1..=60).contains(&retry_after_secs)
        ));

        assert_eq!(limiter.check("b"), RateDecision::Allowed { remaining: 1 });
        assert_eq!(limiter.tracked(), 2);
    }

    #[test]
    fn test_window_expiry_frees_slots() {
        let limiter = RateLimiter::new(Duration::from_millis(50), 1);
        assert!(matches!(limiter.check("c"), RateDecision::Allowed { .. }));
        assert!(matches!(limiter.check("c"), RateDecision::Limited { .. }));

        std::thread::sleep(Duration::from_millis(80));
        assert!(matches!(limiter.check("c"), RateDecision::Allowed { .. }));
    }

    #[test]
    fn test_prune_drops_idle_clients() {
        let limiter = RateLimiter::new(Duration::from_millis(10), 1);
        limiter.check("idle");
        std::thread::sleep(Duration::from_millis(30));

        limiter.prune(Instant::now());
        assert_eq!(limiter.tracked(), 0);
    }
}
