//! Process-wide spacing between transcript fetch attempts.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum interval between consecutive fetch attempts, shared
/// by everything holding a reference to the same instance.
///
/// Best-effort and non-durable: the state lives in this process only and
/// resets on restart. It keeps us under the platform's soft rate limit even
/// when no 429s are coming back; it is not a correctness mechanism.
pub struct FetchThrottle {
    min_interval: Duration,
    last_attempt: Mutex<Option<Instant>>,
}

impl FetchThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_attempt: Mutex::new(None),
        }
    }

    /// Default 0.5s spacing.
    pub fn with_default_interval() -> Self {
        Self::new(Duration::from_millis(500))
    }

    /// Sleep until the minimum interval since the previous attempt has
    /// passed, then claim the current slot. Concurrent callers serialize on
    /// the internal lock, so the spacing holds across tasks.
    pub async fn wait(&self) {
        let mut last = self.last_attempt.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Forget the last attempt. Test hook.
    pub async fn reset(&self) {
        *self.last_attempt.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_second_wait_is_spaced() {
        let throttle = FetchThrottle::new(Duration::from_millis(500));

        let start = Instant::now();
        throttle.wait().await;
        assert!(start.elapsed() < Duration::from_millis(1));

        throttle.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_interval_has_passed() {
        let throttle = FetchThrottle::new(Duration::from_millis(500));
        throttle.wait().await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        let start = Instant::now();
        throttle.wait().await;
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_spacing() {
        let throttle = FetchThrottle::new(Duration::from_millis(500));
        throttle.wait().await;
        throttle.reset().await;

        let start = Instant::now();
        throttle.wait().await;
        assert!(start.elapsed() < Duration::from_millis(1));
    }
}
