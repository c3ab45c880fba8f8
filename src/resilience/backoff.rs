//! Delay between attempts.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

/// Exponential backoff for the `retry`-th retry (1-based): `base * 2^(retry - 1)`,
/// capped at `max`, plus up to 10% jitter.
pub fn calculate_backoff(retry: u32, base: Duration, max: Duration) -> Duration {
    if retry == 0 {
        return Duration::ZERO;
    }

    let factor = 2u32.saturating_pow(retry - 1);
    let capped = base.saturating_mul(factor).min(max);

    let jitter_ms = (capped.as_millis() / 10) as u64;
    let jitter = if jitter_ms > 0 {
        Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
    } else {
        Duration::ZERO
    };

    capped.saturating_add(jitter)
}

/// Maps a 0-based attempt index to the pause before the next attempt.
#[derive(Clone)]
pub enum RetryStrategy {
    /// `step * attempt`: no pause before the first retry, then growing linearly.
    Linear { step: Duration },
    /// Jittered exponential backoff, capped at `max`.
    Exponential { base: Duration, max: Duration },
    /// Caller-supplied schedule.
    Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl RetryStrategy {
    pub const DEFAULT_STEP: Duration = Duration::from_millis(200);

    pub fn linear(step: Duration) -> Self {
        RetryStrategy::Linear { step }
    }

    pub fn exponential(base: Duration, max: Duration) -> Self {
        RetryStrategy::Exponential { base, max }
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        RetryStrategy::Custom(Arc::new(f))
    }

    /// Delay after the failed attempt `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            RetryStrategy::Linear { step } => step.saturating_mul(attempt),
            RetryStrategy::Exponential { base, max } => {
                calculate_backoff(attempt.saturating_add(1), *base, *max)
            }
            RetryStrategy::Custom(f) => f(attempt),
        }
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        RetryStrategy::Linear {
            step: Self::DEFAULT_STEP,
        }
    }
}

impl fmt::Debug for RetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryStrategy::Linear { step } => f.debug_struct("Linear").field("step", step).finish(),
            RetryStrategy::Exponential { base, max } => f
                .debug_struct("Exponential")
                .field("base", base)
                .field("max", max)
                .finish(),
            RetryStrategy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_capped() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(1);

        assert_eq!(calculate_backoff(0, base, max), Duration::ZERO);

        let first = calculate_backoff(1, base, max);
        assert!(first >= base && first < Duration::from_millis(110));

        let second = calculate_backoff(2, base, max);
        assert!(second >= Duration::from_millis(200) && second < Duration::from_millis(220));

        let capped = calculate_backoff(10, base, max);
        assert!(capped >= max && capped < Duration::from_millis(1100));
    }

    #[test]
    fn backoff_survives_huge_retry_counts() {
        let delay = calculate_backoff(u32::MAX, Duration::from_secs(1), Duration::from_secs(30));
        assert!(delay >= Duration::from_secs(30));
    }

    #[test]
    fn linear_default_grows_by_200ms() {
        let strategy = RetryStrategy::default();
        assert_eq!(strategy.delay(0), Duration::ZERO);
        assert_eq!(strategy.delay(1), Duration::from_millis(200));
        assert_eq!(strategy.delay(3), Duration::from_millis(600));
    }

    #[test]
    fn exponential_starts_at_base() {
        let strategy =
            RetryStrategy::exponential(Duration::from_millis(100), Duration::from_millis(500));
        assert!(strategy.delay(0) >= Duration::from_millis(100));
        assert!(strategy.delay(8) < Duration::from_millis(550));
    }

    #[test]
    fn custom_schedule() {
        let strategy = RetryStrategy::custom(|attempt| Duration::from_secs(attempt as u64 + 1));
        assert_eq!(strategy.delay(0), Duration::from_secs(1));
        assert_eq!(format!("{strategy:?}"), "Custom(..)");
    }
}
