use crate::utils::error::Result;
use std::future::Future;
use std::time::Duration;

/// Exponential backoff: attempt `n` waits `multiplier * 2^(n-1)`, clamped to
/// `[min_delay, max_delay]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub multiplier: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            multiplier: Duration::from_secs(1),
            min_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
        }
    }

    /// 下載圖片用：0.5s 起跳
    pub fn download() -> Self {
        Self {
            max_attempts: 4,
            multiplier: Duration::from_millis(500),
            min_delay: Duration::ZERO,
            max_delay: Duration::from_secs(2),
        }
    }

    /// 不等待，測試用
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            multiplier: Duration::ZERO,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let raw = self.multiplier.saturating_mul(1u32 << exponent);
        raw.clamp(self.min_delay, self.max_delay.max(self.min_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(3)
    }
}

pub async fn retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && e.is_retryable() => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "🔁 {} failed (attempt {}/{}): {}. Retrying in {:?}",
                    operation,
                    attempt,
                    max_attempts,
                    e,
                    delay
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
