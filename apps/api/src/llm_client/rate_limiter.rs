//! Request pacing for the completion service.
//!
//! One `RateLimiter` instance is shared (via `Arc`) by every `LlmClient` clone so
//! criteria generation and per-resume evaluation draw from the same upstream budget.
//! The state mutex is held across the pacing sleep, which serializes callers.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

/// Delay multiplier applied after a fast successful response.
const SPEED_UP_FACTOR: f64 = 0.8;
/// Delay multiplier applied after any failed attempt.
const SLOW_DOWN_FACTOR: f64 = 1.5;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Length of the fixed request-counting window.
    pub window: Duration,
    pub max_requests_per_window: u32,
    /// Initial minimum spacing between two consecutive requests.
    pub base_delay: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Responses faster than this ratchet the spacing down.
    pub fast_response: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests_per_window: 3,
            base_delay: Duration::from_secs(21),
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            fast_response: Duration::from_secs(5),
        }
    }
}

#[derive(Debug)]
struct LimiterState {
    window_start: Instant,
    request_count: u32,
    last_request: Option<Instant>,
    current_delay: Duration,
}

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let current_delay = config.base_delay.max(config.min_delay).min(config.max_delay);
        Self {
            state: Mutex::new(LimiterState {
                window_start: Instant::now(),
                request_count: 0,
                last_request: None,
                current_delay,
            }),
            config,
        }
    }

    /// A limiter that never waits. Used where pacing is irrelevant (tests, local mocks).
    pub fn unlimited() -> Self {
        Self::new(RateLimitConfig {
            window: Duration::from_secs(60),
            max_requests_per_window: u32::MAX,
            base_delay: Duration::ZERO,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            fast_response: Duration::ZERO,
        })
    }

    /// Waits until a request may be sent, then records it against the current window.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;

        let now = Instant::now();
        if now.duration_since(state.window_start) >= self.config.window {
            state.window_start = now;
            state.request_count = 0;
        }

        if state.request_count >= self.config.max_requests_per_window {
            let reset_at = state.window_start + self.config.window;
            info!(
                "Request window exhausted ({} requests), waiting {:.1}s for reset",
                state.request_count,
                reset_at.saturating_duration_since(now).as_secs_f64()
            );
            sleep_until(reset_at).await;
            state.window_start = Instant::now();
            state.request_count = 0;
        }

        if let Some(last) = state.last_request {
            let ready_at = last + state.current_delay;
            if ready_at > Instant::now() {
                debug!(
                    "Spacing requests by {}ms",
                    ready_at.saturating_duration_since(Instant::now()).as_millis()
                );
                sleep_until(ready_at).await;
            }
        }

        state.request_count += 1;
        state.last_request = Some(Instant::now());
    }

    /// Shrinks the spacing after a fast success, bounded by the configured floor.
    pub async fn record_success(&self, latency: Duration) {
        if latency >= self.config.fast_response {
            return;
        }
        let mut state = self.state.lock().await;
        state.current_delay = state
            .current_delay
            .mul_f64(SPEED_UP_FACTOR)
            .max(self.config.min_delay);
    }

    /// Grows the spacing after a failure, bounded by the configured ceiling.
    pub async fn record_failure(&self) {
        let mut state = self.state.lock().await;
        state.current_delay = state
            .current_delay
            .mul_f64(SLOW_DOWN_FACTOR)
            .max(self.config.min_delay)
            .min(self.config.max_delay);
    }

    pub async fn current_delay(&self) -> Duration {
        self.state.lock().await.current_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_requests: u32, base_delay_secs: u64) -> RateLimitConfig {
        RateLimitConfig {
            window: Duration::from_secs(60),
            max_requests_per_window: max_requests,
            base_delay: Duration::from_secs(base_delay_secs),
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            fast_response: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlimited_never_waits() {
        let limiter = RateLimiter::unlimited();
        let start = Instant::now();
        for _ in 0..50 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_immediate() {
        let limiter = RateLimiter::new(config(10, 5));
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_requests_are_spaced() {
        let limiter = RateLimiter::new(config(10, 5));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_cap_blocks_until_reset() {
        let limiter = RateLimiter::new(config(2, 1));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_secs(60));

        limiter.acquire().await;
        assert!(
            start.elapsed() >= Duration::from_secs(60),
            "third request went out after {:?}",
            start.elapsed()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_success_ratchets_delay_down_to_floor() {
        let limiter = RateLimiter::new(config(10, 2));
        limiter.record_success(Duration::from_millis(100)).await;
        assert_eq!(limiter.current_delay().await, Duration::from_millis(1600));

        for _ in 0..20 {
            limiter.record_success(Duration::from_millis(100)).await;
        }
        assert_eq!(limiter.current_delay().await, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_success_leaves_delay_unchanged() {
        let limiter = RateLimiter::new(config(10, 2));
        limiter.record_success(Duration::from_secs(8)).await;
        assert_eq!(limiter.current_delay().await, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_ratchets_delay_up_to_ceiling() {
        let limiter = RateLimiter::new(config(10, 2));
        limiter.record_failure().await;
        assert_eq!(limiter.current_delay().await, Duration::from_secs(3));

        for _ in 0..20 {
            limiter.record_failure().await;
        }
        assert_eq!(limiter.current_delay().await, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_base_delay_is_clamped_into_bounds() {
        let limiter = RateLimiter::new(config(10, 120));
        assert_eq!(limiter.current_delay().await, Duration::from_secs(30));
    }
}
