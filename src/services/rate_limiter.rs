use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, Duration, Instant};

/// Bounds upstream market data calls: at most `max_concurrent` in flight,
/// optionally spaced by `min_interval` between request starts.
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    /// # Arguments
    /// * `max_concurrent` - Maximum number of concurrent requests (clamped to at least 1)
    /// * `min_interval` - Minimum spacing between request starts; zero disables pacing
    pub fn new(max_concurrent: usize, min_interval: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    pub fn unpaced(max_concurrent: usize) -> Self {
        Self::new(max_concurrent, Duration::ZERO)
    }

    /// Waits for a concurrency slot and, if pacing is on, for the minimum
    /// interval since the previous request. The slot is released when the
    /// guard drops.
    pub async fn acquire(&self) -> RateLimitGuard {
        let permit = self.semaphore.clone().acquire_owned().await.ok();

        if !self.min_interval.is_zero() {
            // Reserve the next start slot under the lock, sleep outside it
            let wait = {
                let mut last = self.last_request.lock();
                let now = Instant::now();
                let start = match *last {
                    Some(prev) if prev + self.min_interval > now => prev + self.min_interval,
                    _ => now,
                };
                *last = Some(start);
                start.saturating_duration_since(now)
            };
            if !wait.is_zero() {
                sleep(wait).await;
            }
        }

        RateLimitGuard { _permit: permit }
    }

    /// Runs `fut` while holding a slot.
    pub async fn run<F: Future>(&self, fut: F) -> F::Output {
        let _guard = self.acquire().await;
        fut.await
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Holds a concurrency slot until dropped.
pub struct RateLimitGuard {
    _permit: Option<OwnedSemaphorePermit>,
}
