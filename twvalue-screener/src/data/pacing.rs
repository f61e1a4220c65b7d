//! Outbound request pacing.
//!
//! Two independent policies:
//! - [`LanePacer`] is owned by one scan lane: a minimum spacing between that
//!   lane's requests plus a cooldown after every full batch.
//! - [`RateLimiter`] is a token bucket shared by every lane talking to the
//!   same API.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use twvalue_common::PacingConfig;

// ============================================================================
// Lane Pacer
// ============================================================================

/// Per-lane request pacing.
#[derive(Debug)]
pub struct LanePacer {
    min_interval: Duration,
    batch_size: u32,
    batch_cooldown: Duration,
    last_request: Option<Instant>,
    sent_in_batch: u32,
}

impl LanePacer {
    pub fn new(config: &PacingConfig) -> Self {
        Self {
            min_interval: Duration::from_millis(config.min_interval_ms),
            batch_size: config.batch_size,
            batch_cooldown: Duration::from_millis(config.batch_cooldown_ms),
            last_request: None,
            sent_in_batch: 0,
        }
    }

    /// Wait until this lane may issue its next request. Returns the time slept.
    pub async fn wait_turn(&mut self) -> Duration {
        let delay = self.next_delay(Instant::now());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.last_request = Some(Instant::now());
        self.sent_in_batch += 1;
        delay
    }

    fn next_delay(&mut self, now: Instant) -> Duration {
        if self.batch_size > 0 && self.sent_in_batch >= self.batch_size {
            debug!(
                batch_size = self.batch_size,
                cooldown_ms = self.batch_cooldown.as_millis() as u64,
                "Batch complete, cooling down"
            );
            self.sent_in_batch = 0;
            return self.batch_cooldown.max(self.spacing_delay(now));
        }
        self.spacing_delay(now)
    }

    fn spacing_delay(&self, now: Instant) -> Duration {
        match self.last_request {
            Some(last) => self.min_interval.saturating_sub(now.duration_since(last)),
            None => Duration::ZERO,
        }
    }
}

// ============================================================================
// Shared Token Bucket
// ============================================================================

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket rate limiter.
///
/// Holds at most one second worth of requests; tokens refill continuously
/// at `requests_per_minute / 60` per second.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    bucket: Mutex<Bucket>,
    name: String,
}

impl RateLimiter {
    pub fn new(name: impl Into<String>, requests_per_minute: u32) -> Self {
        let rpm = requests_per_minute.max(1) as f64;
        let capacity = (rpm / 60.0).ceil().max(1.0);

        Self {
            capacity,
            refill_per_sec: rpm / 60.0,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            name: name.into(),
        }
    }

    /// Acquire a token, waiting if necessary.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                self.refill(&mut bucket);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.refill_per_sec)
            };

            debug!(
                limiter = %self.name,
                wait_ms = wait.as_millis() as u64,
                "Rate limited, waiting for token"
            );
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.last_refill = now;
    }
}

/// Shared rate limiter that can be cloned.
pub type SharedRateLimiter = Arc<RateLimiter>;

/// Create a shared rate limiter.
pub fn shared_limiter(name: impl Into<String>, requests_per_minute: u32) -> SharedRateLimiter {
    Arc::new(RateLimiter::new(name, requests_per_minute))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pacing(min_interval_ms: u64, batch_size: u32, batch_cooldown_ms: u64) -> PacingConfig {
        PacingConfig {
            min_interval_ms,
            batch_size,
            batch_cooldown_ms,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_immediate() {
        let mut pacer = LanePacer::new(&pacing(50, 100, 5000));
        assert_eq!(pacer.wait_turn().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_interval_between_requests() {
        let mut pacer = LanePacer::new(&pacing(50, 0, 0));
        pacer.wait_turn().await;

        let start = Instant::now();
        pacer.wait_turn().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_when_interval_already_elapsed() {
        let mut pacer = LanePacer::new(&pacing(50, 0, 0));
        pacer.wait_turn().await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(pacer.wait_turn().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_after_full_batch() {
        let mut pacer = LanePacer::new(&pacing(0, 3, 5000));
        for _ in 0..3 {
            assert_eq!(pacer.wait_turn().await, Duration::ZERO);
        }
        assert_eq!(pacer.wait_turn().await, Duration::from_millis(5000));
        // New batch starts after the cooldown
        assert_eq!(pacer.wait_turn().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_pacing_never_waits() {
        let mut pacer = LanePacer::new(&pacing(0, 0, 0));
        for _ in 0..500 {
            assert_eq!(pacer.wait_turn().await, Duration::ZERO);
        }
    }

    #[test]
    fn test_rate_limiter_capacity() {
        assert_eq!(RateLimiter::new("test", 300).capacity, 5.0);
        assert_eq!(RateLimiter::new("test", 30).capacity, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_refill() {
        let limiter = RateLimiter::new("test", 120); // 2 req/sec
        limiter.acquire().await;
        limiter.acquire().await;

        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(490));
    }
}
