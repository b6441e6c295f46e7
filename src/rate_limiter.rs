//! A token-bucket rate limiter with an adaptive refill rate: the [`crate::client::Client`]
//! backs off on `429` responses and eases back toward the maximum rate on success.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default maximum refill rate, in tokens per second.
pub const DEFAULT_MAX_RATE: f64 = 100.0;
/// Default minimum refill rate, in tokens per second.
pub const DEFAULT_MIN_RATE: f64 = 1.0;
/// Default bucket burst size.
pub const DEFAULT_BURST: f64 = 10.0;

/// The amount `backoff` decreases the rate by, in tokens per second.
const BACKOFF_STEP: f64 = 10.0;
/// The amount `ease_backoff` increases the rate by, in tokens per second.
const EASE_STEP: f64 = 1.0;

struct BucketState {
    rate: f64,
    tokens: f64,
    last_refill: Instant,
}

/// An adaptive token bucket. `wait` suspends the caller until a token is
/// available; `backoff`/`ease_backoff` adjust the refill rate and are
/// mutually exclusive with each other.
pub struct RateLimiter {
    min_rate: f64,
    max_rate: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    /// Constructs a rate limiter with explicit bounds and burst size.
    pub fn new(min_rate: f64, max_rate: f64, burst: f64) -> Self {
        Self {
            min_rate,
            max_rate,
            burst,
            state: Mutex::new(BucketState {
                rate: max_rate,
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Suspends the caller until a token is available, consuming one.
    pub async fn wait(&self) {
        loop {
            let sleep_for = {
                let mut state = self.state.lock().expect("rate limiter lock poisoned");
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    let deficit = 1.0 - state.tokens;
                    Some(Duration::from_secs_f64(deficit / state.rate))
                }
            };

            match sleep_for {
                None => return,
                Some(duration) => tokio::time::sleep(duration).await,
            }
        }
    }

    /// Decreases the refill rate by 10 tokens/s, clamped at `min_rate`.
    pub fn backoff(&self) {
        let mut state = self.state.lock().expect("rate limiter lock poisoned");
        self.refill(&mut state);
        state.rate = (state.rate - BACKOFF_STEP).max(self.min_rate);
    }

    /// Increases the refill rate by 1 token/s, clamped at `max_rate`.
    pub fn ease_backoff(&self) {
        let mut state = self.state.lock().expect("rate limiter lock poisoned");
        self.refill(&mut state);
        state.rate = (state.rate + EASE_STEP).min(self.max_rate);
    }

    /// Returns the current refill rate, mainly for tests.
    pub fn current_rate(&self) -> f64 {
        self.state.lock().expect("rate limiter lock poisoned").rate
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * state.rate).min(self.burst);
        state.last_refill = now;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_RATE, DEFAULT_MAX_RATE, DEFAULT_BURST)
    }
}
