use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::LiteralType;

/// Named, typed inputs and outputs of a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Interface {
  #[serde(default)]
  pub inputs: BTreeMap<String, LiteralType>,
  #[serde(default)]
  pub outputs: BTreeMap<String, LiteralType>,
}

impl Interface {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn input(mut self, name: impl Into<String>, ty: LiteralType) -> Self {
    self.inputs.insert(name.into(), ty);
    self
  }

  pub fn output(mut self, name: impl Into<String>, ty: LiteralType) -> Self {
    self.outputs.insert(name.into(), ty);
    self
  }
}
