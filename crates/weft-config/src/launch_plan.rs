use serde::{Deserialize, Serialize};
use weft_literal::LiteralMap;

use crate::identifier::Identifier;

/// A named binding of a workflow to default and fixed inputs.
///
/// Defaults may be overridden at launch; fixed inputs may not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchPlanDef {
  pub id: Identifier,
  pub workflow: Identifier,
  #[serde(default, skip_serializing_if = "LiteralMap::is_empty")]
  pub default_inputs: LiteralMap,
  #[serde(default, skip_serializing_if = "LiteralMap::is_empty")]
  pub fixed_inputs: LiteralMap,
}

impl LaunchPlanDef {
  pub fn new(id: Identifier, workflow: Identifier) -> Self {
    Self {
      id,
      workflow,
      default_inputs: LiteralMap::new(),
      fixed_inputs: LiteralMap::new(),
    }
  }
}
