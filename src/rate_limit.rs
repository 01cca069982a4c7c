//! Request throttling shared by every call issued from one context.

use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use tokio::time::{sleep_until, Instant};

/// Spaces permit grants at least `1 / queries_per_second` apart.
///
/// The limiter keeps a single "next eligible time" cursor. Each acquisition
/// reserves the slot at `max(cursor, now)` and advances the cursor by one
/// interval under the lock, then sleeps outside the lock until its slot.
/// Callers are never rejected; excess callers queue on the clock.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Option<Duration>,
    next_eligible: Mutex<Instant>,
}

impl RateLimiter {
    /// Creates a limiter. A rate of zero disables throttling.
    pub fn new(queries_per_second: u32) -> Self {
        let interval =
            (queries_per_second > 0).then(|| Duration::from_secs(1) / queries_per_second);
        Self {
            interval,
            next_eligible: Mutex::new(Instant::now()),
        }
    }

    /// Minimum spacing between permits, or `None` when throttling is off.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Waits for a permit and returns the instant it was granted at.
    pub async fn acquire(&self) -> Instant {
        let Some(interval) = self.interval else {
            return Instant::now();
        };

        let slot = self.reserve(interval);
        if slot > Instant::now() {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                wait_ms = slot.saturating_duration_since(Instant::now()).as_millis() as u64,
                "waiting for rate limit permit"
            );
            sleep_until(slot).await;
        }
        slot
    }

    fn reserve(&self, interval: Duration) -> Instant {
        let mut cursor = self
            .next_eligible
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let slot = (*cursor).max(Instant::now());
        *cursor = slot + interval;
        slot
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(crate::options::DEFAULT_QUERIES_PER_SECOND)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::time::Instant;

    use super::RateLimiter;

    #[tokio::test(start_paused = true)]
    async fn concurrent_grants_are_spaced_by_interval() {
        let limiter = Arc::new(RateLimiter::new(10));
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.acquire().await })
            })
            .collect();

        let mut granted = Vec::with_capacity(tasks.len());
        for task in tasks {
            granted.push(task.await.expect("task must not panic"));
        }
        granted.sort();

        for pair in granted.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_permit_is_immediate() {
        let limiter = RateLimiter::new(1);
        let start = Instant::now();
        let granted = limiter.acquire().await;
        assert_eq!(granted, start);
    }

    #[tokio::test(start_paused = true)]
    async fn caller_sleeps_until_its_slot() {
        let limiter = RateLimiter::new(2);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(Instant::now() - start >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_rate_disables_throttling() {
        let limiter = RateLimiter::new(0);
        assert!(limiter.interval().is_none());
        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_time_is_not_banked_as_burst() {
        let limiter = RateLimiter::new(10);
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        let first = limiter.acquire().await;
        let second = limiter.acquire().await;
        assert!(second - first >= Duration::from_millis(100));
    }
}
