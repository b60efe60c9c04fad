use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Fixed-window request budget per client IP, held in process memory.
#[derive(Clone)]
pub struct RateLimiter {
    capacity: u32,
    window: Duration,
    buckets: Arc<Mutex<HashMap<String, RateBucket>>>,
}

#[derive(Debug, Clone, Copy)]
struct RateBucket {
    tokens: u32,
    reset_at: Instant,
}

impl RateLimiter {
    pub fn new(capacity: u32, window: Duration) -> Self {
        RateLimiter {
            capacity,
            window,
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Take one token for `ip`. Returns false once the window's budget is spent.
    pub fn take(&self, ip: &str) -> bool {
        self.take_at(ip, Instant::now())
    }

    pub fn take_at(&self, ip: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(bucket) = buckets.get_mut(ip) {
            if now <= bucket.reset_at {
                if bucket.tokens == 0 {
                    return false;
                }
                bucket.tokens -= 1;
                return true;
            }
        }

        // first request from this IP, or its window has expired
        buckets.insert(
            ip.to_string(),
            RateBucket {
                tokens: self.capacity.saturating_sub(1),
                reset_at: now + self.window,
            },
        );
        true
    }

    /// Drop buckets whose window has passed. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    pub fn sweep_expired_at(&self, now: Instant) -> usize {
        let mut buckets = self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let initial_count = buckets.len();

        buckets.retain(|_, bucket| now <= bucket.reset_at);

        initial_count - buckets.len()
    }

    /// Number of tracked client IPs
    pub fn len(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Periodically evict expired buckets until the returned handle is aborted.
pub fn spawn_sweeper(limiter: RateLimiter, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = limiter.sweep_expired();
            if removed > 0 {
                tracing::debug!(removed, remaining = limiter.len(), "Swept expired rate limit buckets");
            }
        }
    })
}
