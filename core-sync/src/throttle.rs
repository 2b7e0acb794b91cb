//! Outbound request throttle.
//!
//! A token bucket holding `capacity` tokens that refills completely once
//! `interval` has passed since the current window opened. Each request takes
//! one token; when the bucket is empty the caller sleeps until the window
//! rolls over.
//!
//! Waiters are served in arrival order: the bucket sits behind a
//! `tokio::sync::Mutex` (which is fair) and the holder keeps it while sleeping,
//! so later callers queue behind earlier ones instead of racing for the refill.

use crate::error::{Result, SyncError};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

#[derive(Debug)]
struct Bucket {
    window_start: Option<Instant>,
    remaining: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    interval: Duration,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// `capacity` requests per `interval`. A zero capacity is treated as one.
    pub fn new(capacity: u32, interval: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            interval,
            bucket: Mutex::new(Bucket {
                window_start: None,
                remaining: capacity,
            }),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until a token is available and take it.
    pub async fn acquire(&self) {
        let mut bucket = self.bucket.lock().await;

        loop {
            let now = Instant::now();
            let window_start = match bucket.window_start {
                Some(start) if now < start + self.interval => start,
                _ => {
                    bucket.window_start = Some(now);
                    bucket.remaining = self.capacity;
                    now
                }
            };

            if bucket.remaining > 0 {
                bucket.remaining -= 1;
                return;
            }

            let refill_at = window_start + self.interval;
            trace!(
                wait_ms = refill_at.saturating_duration_since(now).as_millis() as u64,
                "Rate limit reached, waiting for refill"
            );
            sleep_until(refill_at).await;
        }
    }

    /// [`acquire`](Self::acquire) bounded by `timeout`.
    pub async fn acquire_with_timeout(&self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.acquire())
            .await
            .map_err(|_| SyncError::RateLimitTimeout(timeout))
    }
}
