//! ============================================================================
//! Retry Policy - Exponential backoff for chat completion requests
//! ============================================================================
//! Attempts are counted from 1. The wait before attempt n+1 is
//! `base_delay_ms * 2^n`, so the defaults give 2s then 4s across 3 attempts.
//! Waiting goes through `Sleeper` so tests can observe delays without time
//! passing.
//! ============================================================================

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

/// Configuration for completion retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Base delay (multiplied by 2^attempt)
    pub base_delay_ms: u64,
    /// Maximum delay between attempts
    pub max_delay_ms: u64,
    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 8000,
            jitter: false,
        }
    }
}

/// Delay to wait after the given (1-based) attempt failed
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    // Cap the exponent so the shift cannot overflow
    let multiplier = 2u64.saturating_pow(attempt.min(63));
    let base_delay = config.base_delay_ms.saturating_mul(multiplier);
    let capped_delay = base_delay.min(config.max_delay_ms);

    let final_delay = if config.jitter {
        // Up to 50% extra
        let jitter_factor = 1.0 + rand::thread_rng().gen_range(0.0..0.5);
        (capped_delay as f64 * jitter_factor) as u64
    } else {
        capped_delay
    };

    Duration::from_millis(final_delay)
}

/// Clock seam for backoff waits
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real clock
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
