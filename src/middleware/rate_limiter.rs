use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Fixed-window request counter for one external service
#[derive(Debug, Default)]
struct RateWindow {
    /// `None` until the first call
    window_start: Option<Instant>,
    count: u32,
}

/// Observable state of one service window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    pub count: u32,
    pub age: Option<Duration>,
}

/// Per-service requests-per-window limiter.
///
/// Each service key owns an independent window. A call that would exceed the
/// budget sleeps until the window ends and then counts toward a fresh window.
/// The window lock is held only while reading and updating the counter, never
/// across the sleep.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<DashMap<String, Arc<Mutex<RateWindow>>>>,
    window: Duration,
}

impl RateLimiter {
    /// Create a limiter with the standard one-minute window
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(60))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait until a call to `service_key` fits within `budget` calls per window.
    ///
    /// A budget of 0 means unlimited and returns immediately without touching
    /// any state. Returns the time spent blocked.
    pub async fn acquire(&self, service_key: &str, budget: u32) -> Duration {
        if budget == 0 {
            return Duration::ZERO;
        }

        let window = self.window_for(service_key);
        let started = Instant::now();

        loop {
            let wait = {
                let mut state = window.lock();
                let now = Instant::now();
                let window_start = match state.window_start {
                    Some(start) if now.duration_since(start) < self.window => start,
                    _ => {
                        state.window_start = Some(now);
                        state.count = 0;
                        now
                    }
                };

                if state.count < budget {
                    state.count += 1;
                    None
                } else {
                    Some(self.window - now.duration_since(window_start))
                }
            };

            match wait {
                None => return started.elapsed(),
                Some(remaining) => {
                    debug!(
                        "Rate limit reached for {} ({} per {:?}), waiting {:?}",
                        service_key, budget, self.window, remaining
                    );
                    tokio::time::sleep(remaining).await;
                }
            }
        }
    }

    /// Current counter for a service, `None` if it was never called
    pub fn window_state(&self, service_key: &str) -> Option<WindowState> {
        self.windows.get(service_key).map(|entry| {
            let state = entry.lock();
            WindowState {
                count: state.count,
                age: state.window_start.map(|start| start.elapsed()),
            }
        })
    }

    fn window_for(&self, service_key: &str) -> Arc<Mutex<RateWindow>> {
        self.windows
            .entry(service_key.to_string())
            .or_default()
            .value()
            .clone()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_zero_budget_is_unlimited() {
        let limiter = RateLimiter::new();
        for _ in 0..100 {
            assert_eq!(limiter.acquire("translation/deepseek", 0).await, Duration::ZERO);
        }
        assert!(limiter.window_state("translation/deepseek").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocks_when_budget_exhausted() {
        let limiter = RateLimiter::new();

        assert_eq!(limiter.acquire("ocr/ai_vision", 2).await, Duration::ZERO);
        assert_eq!(limiter.acquire("ocr/ai_vision", 2).await, Duration::ZERO);

        let begin = Instant::now();
        let waited = limiter.acquire("ocr/ai_vision", 2).await;
        assert!(waited >= Duration::from_secs(60) && waited < Duration::from_secs(61));
        assert!(begin.elapsed() >= Duration::from_secs(60));

        // The blocked call opened a fresh window
        let state = limiter.window_state("ocr/ai_vision").unwrap();
        assert_eq!(state.count, 1);
        assert_eq!(state.age, Some(Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_services_are_independent() {
        let limiter = RateLimiter::new();
        limiter.acquire("ocr/ai_vision", 1).await;

        assert_eq!(limiter.acquire("translation/deepseek", 1).await, Duration::ZERO);
        assert_eq!(limiter.window_state("ocr/ai_vision").unwrap().count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expiry_resets_count() {
        let limiter = RateLimiter::with_window(Duration::from_secs(10));
        limiter.acquire("translation/volcano", 1).await;

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(limiter.acquire("translation/volcano", 1).await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_never_exceed_budget() {
        let limiter = RateLimiter::new();
        let mut handles = Vec::new();
        for _ in 0..5 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire("translation/siliconflow", 2).await
            }));
        }

        let mut waits = Vec::new();
        for handle in handles {
            waits.push(handle.await.unwrap().as_secs());
        }
        waits.sort_unstable();
        assert_eq!(waits, vec![0, 0, 60, 60, 120]);
    }
}
