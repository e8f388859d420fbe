//! Token-bucket rate limiting (§4.5): capacity equals `rate_per_minute`,
//! refill is continuous at `rate_per_minute / 60` tokens per second.

use std::sync::Mutex;
use std::time::{Duration, Instant};

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    fn refill(&mut self, capacity: f64, refill_per_second: f64, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_per_second).min(capacity);
        self.last_refill = now;
    }

    fn try_take(&mut self, n: f64) -> bool {
        if self.tokens >= n {
            self.tokens -= n;
            true
        } else {
            false
        }
    }
}

pub struct TokenBucket {
    capacity: f64,
    refill_per_second: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(rate_per_minute: u32) -> Self {
        let capacity = f64::from(rate_per_minute.max(1));
        Self {
            capacity,
            refill_per_second: capacity / 60.0,
            state: Mutex::new(BucketState { tokens: capacity, last_refill: Instant::now() }),
        }
    }

    /// Consumes `n` tokens iff available; never blocks.
    pub fn acquire(&self, n: f64) -> bool {
        let mut state = self.state.lock().expect("token bucket mutex poisoned");
        state.refill(self.capacity, self.refill_per_second, Instant::now());
        state.try_take(n)
    }

    /// Sleeps for the refill interval (the time to accrue one token) until a
    /// single token is available, then consumes it.
    pub async fn wait_for_token(&self) {
        let interval = Duration::from_secs_f64(1.0 / self.refill_per_second);
        loop {
            if self.acquire(1.0) {
                return;
            }
            tokio::time::sleep(interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_equals_rate_per_minute() {
        let bucket = TokenBucket::new(120);
        assert_eq!(bucket.capacity, 120.0);
        assert_eq!(bucket.refill_per_second, 2.0);
    }

    #[test]
    fn acquire_drains_the_bucket_then_refuses() {
        let bucket = TokenBucket::new(3);
        assert!(bucket.acquire(3.0));
        assert!(!bucket.acquire(1.0));
    }

    #[test]
    fn refill_accrues_tokens_over_elapsed_time() {
        let mut state = BucketState { tokens: 0.0, last_refill: Instant::now() - Duration::from_secs(10) };
        state.refill(60.0, 1.0, Instant::now());
        assert!(state.tokens >= 9.0 && state.tokens <= 10.0);
    }

    #[test]
    fn refill_never_exceeds_capacity() {
        let mut state = BucketState { tokens: 59.0, last_refill: Instant::now() - Duration::from_secs(1000) };
        state.refill(60.0, 1.0, Instant::now());
        assert_eq!(state.tokens, 60.0);
    }

    #[tokio::test]
    async fn wait_for_token_eventually_succeeds() {
        let bucket = TokenBucket::new(6_000);
        assert!(bucket.acquire(6_000.0));
        bucket.wait_for_token().await;
    }
}
