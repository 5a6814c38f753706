use serde::{Deserialize, Serialize};
use weft_literal::Interface;

use crate::identifier::Identifier;
use crate::retry::RetryPolicy;

/// A registered task: a named handler with a declared interface.
///
/// `handler` names the invocation wrapper in the task catalog the engine was built
/// with; the catalog's declared interface must equal `interface`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDef {
  pub id: Identifier,
  pub handler: String,
  #[serde(default)]
  pub interface: Interface,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub retry: Option<RetryPolicy>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
}
