use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryBackoff {
  Constant,
  Linear,
  Exponential,
}

/// How often a failing node is attempted and how long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  /// Total attempts, including the first. Values below 1 are treated as 1.
  pub max_attempts: u32,
  pub backoff: RetryBackoff,
  pub initial_delay_ms: u64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 1,
      backoff: RetryBackoff::Exponential,
      initial_delay_ms: 100,
    }
  }
}

impl RetryPolicy {
  pub fn new(max_attempts: u32, backoff: RetryBackoff, initial_delay_ms: u64) -> Self {
    Self {
      max_attempts,
      backoff,
      initial_delay_ms,
    }
  }

  pub fn attempts(&self) -> u32 {
    self.max_attempts.max(1)
  }

  /// Delay before the attempt following failed attempt number `attempt` (1-based).
  pub fn delay(&self, attempt: u32) -> Duration {
    let attempt = attempt.max(1);
    let ms = match self.backoff {
      RetryBackoff::Constant => self.initial_delay_ms,
      RetryBackoff::Linear => self.initial_delay_ms.saturating_mul(u64::from(attempt)),
      RetryBackoff::Exponential => {
        let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
        self.initial_delay_ms.saturating_mul(factor)
      }
    };
    Duration::from_millis(ms)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_delays() {
    let constant = RetryPolicy::new(3, RetryBackoff::Constant, 50);
    assert_eq!(constant.delay(1), Duration::from_millis(50));
    assert_eq!(constant.delay(3), Duration::from_millis(50));

    let linear = RetryPolicy::new(3, RetryBackoff::Linear, 50);
    assert_eq!(linear.delay(3), Duration::from_millis(150));

    let exponential = RetryPolicy::new(5, RetryBackoff::Exponential, 10);
    assert_eq!(exponential.delay(1), Duration::from_millis(10));
    assert_eq!(exponential.delay(4), Duration::from_millis(80));
  }

  #[test]
  fn test_exponential_saturates() {
    let policy = RetryPolicy::new(100, RetryBackoff::Exponential, 1000);
    assert_eq!(policy.delay(90), Duration::from_millis(u64::MAX));
  }

  #[test]
  fn test_partial_json_uses_defaults() {
    let policy: RetryPolicy = serde_json::from_str(r#"{"max_attempts": 4}"#).unwrap();
    assert_eq!(policy.max_attempts, 4);
    assert_eq!(policy.backoff, RetryBackoff::Exponential);
    assert_eq!(RetryPolicy::new(0, RetryBackoff::Constant, 0).attempts(), 1);
  }
}
