//! Named request-rate limiters.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::config::RateLimitConfig;

/// Token bucket limiter shared by every caller of one API.
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    max_tokens: f64,
    refill_rate: f64,
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// A full bucket of `burst` tokens refilled at `per_second`.
    #[must_use]
    pub fn new(per_second: f64, burst: u32) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket {
                tokens: f64::from(burst),
                last_refill: Instant::now(),
            }),
            max_tokens: f64::from(burst),
            refill_rate: per_second,
        }
    }

    /// Take one token if available.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> bool {
        let mut bucket = self.bucket.lock();

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let tokens_to_add = (elapsed.as_secs_f64() * self.refill_rate).min(self.max_tokens);
        if tokens_to_add > 0.0 {
            bucket.tokens = (bucket.tokens + tokens_to_add).min(self.max_tokens);
            bucket.last_refill = now;
        }

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub fn per_second(&self) -> f64 {
        self.refill_rate
    }

    pub fn burst(&self) -> u32 {
        self.max_tokens as u32
    }
}

/// Immutable map from API name to limiter.
#[derive(Clone, Default)]
pub struct RateLimiterRegistry {
    limiters: HashMap<String, Arc<RateLimiter>>,
}

impl RateLimiterRegistry {
    pub fn new(limiters: HashMap<String, Arc<RateLimiter>>) -> Self {
        Self { limiters }
    }

    pub fn from_config(config: &BTreeMap<String, RateLimitConfig>) -> Self {
        let limiters = config
            .iter()
            .map(|(name, limit)| {
                let limiter = RateLimiter::new(limit.per_second, limit.burst_or_default());
                (name.clone(), Arc::new(limiter))
            })
            .collect();
        Self { limiters }
    }

    /// Limiter for `name`; `None` means unlimited.
    pub fn get(&self, name: &str) -> Option<Arc<RateLimiter>> {
        self.limiters.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}
