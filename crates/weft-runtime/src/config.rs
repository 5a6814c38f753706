use serde::{Deserialize, Serialize};
use weft_config::RetryPolicy;

/// Engine-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
  /// Retry policy for nodes that resolve none of their own.
  pub default_retry: RetryPolicy,
  /// Upper bound on nodes running at once across all executions.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_parallelism: Option<usize>,
}
