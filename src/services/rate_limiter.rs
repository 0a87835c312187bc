use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Sliding-window rate limiter guarding a single vendor instance.
///
/// Holds a bounded deque of request timestamps covering the trailing
/// `window`. Before a caller is allowed through, stale timestamps are
/// purged; if the window is still full the caller sleeps until the
/// oldest entry ages out (plus a small clock-skew buffer), then the
/// purge/check is repeated. One instance must never be shared across
/// jobs (§5) — the window state is per-job, not global.
pub struct SlidingWindowLimiter {
    window: Duration,
    max_requests: usize,
    skew_buffer: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            skew_buffer: Duration::from_millis(100),
            timestamps: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    /// Blocks until a request slot is available, then reserves it.
    pub async fn acquire(&self) {
        loop {
            let mut timestamps = self.timestamps.lock().await;
            let now = Instant::now();
            self.purge(&mut timestamps, now);

            if timestamps.len() < self.max_requests {
                timestamps.push_back(now);
                return;
            }

            let oldest = *timestamps.front().expect("window full implies non-empty");
            let wake_at = oldest + self.window + self.skew_buffer;
            drop(timestamps);

            let now = Instant::now();
            if wake_at > now {
                tokio::time::sleep(wake_at - now).await;
            }
            // loop around: re-purge and re-check rather than assuming
            // we now have room, since other callers may have raced in.
        }
    }

    fn purge(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&front) = timestamps.front() {
            if now.duration_since(front) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    #[cfg(test)]
    pub async fn in_window_count(&self) -> usize {
        let mut timestamps = self.timestamps.lock().await;
        let now = Instant::now();
        self.purge(&mut timestamps, now);
        timestamps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn admits_up_to_the_cap_without_sleeping() {
        let limiter = SlidingWindowLimiter::new(Duration::from_secs(30), 3);
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(limiter.in_window_count().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn blocks_the_caller_past_the_cap_until_the_window_ages_out() {
        let limiter = SlidingWindowLimiter::new(Duration::from_secs(30), 2);
        limiter.acquire().await;
        limiter.acquire().await;

        let start = Instant::now();
        let handle = tokio::spawn(async move {
            limiter.acquire().await;
        });

        tokio::time::advance(Duration::from_secs(31)).await;
        handle.await.unwrap();
        assert!(Instant::now().duration_since(start) >= Duration::from_secs(30));
    }
}
