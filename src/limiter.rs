// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Token bucket rate limiter keyed by (site, client).
//!
//! Refill is lazy and counts whole refill units only: a bucket gains one
//! token per full unit elapsed since its own last refill, never a fraction.
//! The first request of a new pair is admitted and consumes a token.
//!
//! Every read-modify-write happens under one lock over the whole store. The
//! store is kept in recency order and is bounded: [`RateLimiter::sweep`]
//! drops buckets that have refilled to capacity (indistinguishable from a
//! fresh bucket), and inserting past the configured cap evicts the least
//! recently seen bucket in constant time.

use crate::clock::{Clock, SystemClock};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BucketKey {
    tenant: String,
    client: String,
}

/// Token bucket for one (site, client) pair.
#[derive(Debug)]
struct TokenBucket {
    /// Available tokens
    tokens: u32,
    /// Last time whole units were credited
    last_refill: Instant,
    /// Capacity and unit from the most recent call, used by the sweep
    capacity: u32,
    interval: Duration,
}

impl TokenBucket {
    /// A bucket for a first request, which is admitted and pays one token.
    fn admitted(now: Instant, capacity: u32, interval: Duration) -> Self {
        Self {
            tokens: capacity.saturating_sub(1),
            last_refill: now,
            capacity,
            interval,
        }
    }

    /// Whole refill units elapsed since the last refill.
    fn elapsed_units(&self, now: Instant, interval: Duration) -> u32 {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let units = elapsed.as_nanos() / interval.as_nanos().max(1);
        u32::try_from(units).unwrap_or(u32::MAX)
    }

    fn try_consume(&mut self, now: Instant, capacity: u32, interval: Duration) -> bool {
        let units = self.elapsed_units(now, interval);
        if units > 0 {
            self.tokens = self.tokens.saturating_add(units).min(capacity);
            self.last_refill = now;
        }
        self.capacity = capacity;
        self.interval = interval;

        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }

    /// True when a refill now would leave the bucket full, so dropping it
    /// changes nothing about future decisions.
    fn is_replenished(&self, now: Instant) -> bool {
        let missing = self.capacity.saturating_sub(self.tokens).max(1);
        self.elapsed_units(now, self.interval) >= missing
    }
}

/// Thread-safe rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    /// Buckets in recency order; bounded unless the cap is zero
    buckets: Mutex<LruCache<BucketKey, TokenBucket>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter holding at most `max_buckets` buckets.
    pub fn new(max_buckets: usize) -> Self {
        Self::with_clock(max_buckets, Arc::new(SystemClock))
    }

    pub fn with_clock(max_buckets: usize, clock: Arc<dyn Clock>) -> Self {
        let buckets = match NonZeroUsize::new(max_buckets) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        Self {
            buckets: Mutex::new(buckets),
            clock,
        }
    }

    /// Decide whether a request from `client` to `tenant` is admitted.
    ///
    /// `burst` is the bucket capacity and `refill_interval` the time it takes
    /// to earn one token back.
    pub async fn allow(&self, tenant: &str, client: &str, burst: u32, refill_interval: Duration) -> bool {
        let key = BucketKey {
            tenant: tenant.to_string(),
            client: client.to_string(),
        };

        let mut buckets = self.buckets.lock().await;
        let now = self.clock.now();

        // Lookup marks the bucket most recently seen
        if let Some(bucket) = buckets.get_mut(&key) {
            let allowed = bucket.try_consume(now, burst, refill_interval);
            if !allowed {
                debug!(tenant, client, "Rate limit exceeded");
            }
            return allowed;
        }

        if let Some((evicted, _)) = buckets.push(key, TokenBucket::admitted(now, burst, refill_interval)) {
            debug!(tenant = %evicted.tenant, client = %evicted.client, "Evicting least recently seen bucket");
        }
        true
    }

    /// Drop buckets that have refilled to capacity. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let mut buckets = self.buckets.lock().await;
        let now = self.clock.now();
        let stale: Vec<BucketKey> = buckets
            .iter()
            .filter(|(_, bucket)| bucket.is_replenished(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            buckets.pop(key);
        }
        let removed = stale.len();
        if removed > 0 {
            debug!(removed, remaining = buckets.len(), "Swept idle rate limit buckets");
        }
        removed
    }

    /// Number of live buckets.
    pub async fn len(&self) -> usize {
        self.buckets.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
