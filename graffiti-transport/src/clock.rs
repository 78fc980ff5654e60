//! An injectable wall-clock (§5 suspension points), so the retry/backoff and
//! rate-limit logic in [`crate::retry`] and [`crate::inbox`] can be driven
//! deterministically in tests instead of by real `tokio::time::sleep` calls.

use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// A source of the current time and of suspension.
#[async_trait]
pub trait Clock: Send + Sync {
    /// The current time, as Unix epoch milliseconds.
    fn now_millis(&self) -> i64;
    /// Suspends the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// The real system clock, backed by `tokio::time`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
            Ok(d) => d.as_millis() as i64,
            Err(_) => 0,
        }
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A deterministic clock for tests: `sleep` advances the clock's own notion
/// of time instantly instead of suspending, and records every duration it
/// was asked to wait.
#[derive(Debug)]
pub struct FakeClock {
    now_millis: AtomicI64,
    sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    /// Builds a fake clock starting at `start_millis`.
    pub fn new(start_millis: i64) -> Self {
        Self {
            now_millis: AtomicI64::new(start_millis),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Returns every duration `sleep` was called with, in call order.
    pub async fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().await.clone()
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now_millis(&self) -> i64 {
        self.now_millis.load(Ordering::SeqCst)
    }

    async fn sleep(&self, duration: Duration) {
        self.now_millis
            .fetch_add(duration.as_millis() as i64, Ordering::SeqCst);
        self.sleeps.lock().await.push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_clock_advances_on_sleep_without_suspending() {
        let clock = FakeClock::new(1_000);
        clock.sleep(Duration::from_millis(500)).await;
        assert_eq!(clock.now_millis(), 1_500);
        assert_eq!(clock.sleeps().await, vec![Duration::from_millis(500)]);
    }

    #[tokio::test]
    async fn system_clock_reports_a_plausible_time() {
        let clock = SystemClock;
        assert!(clock.now_millis() > 1_700_000_000_000);
    }
}
