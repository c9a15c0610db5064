//! Delay policies for the retry runner.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Largest exponent applied by [`Backoff::Exponential`].
const MAX_DOUBLINGS: u32 = 16;

/// How long to wait before the next probe invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Backoff {
    /// Wait the same interval before every retry.
    Fixed {
        /// The interval between attempts.
        delay: Duration,
    },
    /// Double the interval before every retry, capped at `max`.
    Exponential {
        /// Delay before the first retry.
        initial: Duration,
        /// Upper bound for any single delay.
        max: Duration,
    },
}

impl Backoff {
    /// A fixed interval.
    pub fn fixed(delay: Duration) -> Self {
        Self::Fixed { delay }
    }

    /// A fixed interval given in whole seconds.
    pub fn fixed_seconds(seconds: u64) -> Self {
        Self::fixed(Duration::from_secs(seconds))
    }

    /// A doubling interval starting at `initial` and never exceeding `max`.
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self::Exponential { initial, max }
    }

    /// Delay before retry number `retry` (1-indexed: the wait after the
    /// first failed attempt is `delay(1)`).
    pub fn delay(&self, retry: u32) -> Duration {
        match *self {
            Self::Fixed { delay } => delay,
            Self::Exponential { initial, max } => {
                let exp = retry.saturating_sub(1).min(MAX_DOUBLINGS);
                initial.saturating_mul(1u32 << exp).min(max)
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::fixed_seconds(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay_is_constant() {
        let backoff = Backoff::fixed_seconds(10);
        assert_eq!(backoff.delay(1), Duration::from_secs(10));
        assert_eq!(backoff.delay(7), Duration::from_secs(10));
    }

    #[test]
    fn test_exponential_doubles_and_caps() {
        let backoff = Backoff::exponential(Duration::from_secs(1), Duration::from_secs(10));
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(2), Duration::from_secs(2));
        assert_eq!(backoff.delay(3), Duration::from_secs(4));
        assert_eq!(backoff.delay(4), Duration::from_secs(8));
        assert_eq!(backoff.delay(5), Duration::from_secs(10));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_deserializes_from_config() {
        let value = serde_json::json!({"kind": "fixed", "delay": {"secs": 3, "nanos": 0}});
        let backoff: Backoff = serde_json::from_value(value).unwrap();
        assert_eq!(backoff, Backoff::fixed_seconds(3));
    }
}
