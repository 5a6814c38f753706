use std::collections::BTreeMap;

use serde::Serialize;
use weft_config::{Identifier, RetryPolicy};
use weft_literal::{Interface, LiteralType, TypedLiteral};

/// A resolved task invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
  pub node_id: String,
  pub task: Identifier,
  /// Catalog handler the task was registered with.
  pub handler: String,
  pub interface: Interface,
  /// Exactly one binding per declared input.
  pub inputs: BTreeMap<String, Binding>,
  /// Invocation, task or workflow policy, in that order of precedence. `None`
  /// falls back to the engine default.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub retry: Option<RetryPolicy>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
}

/// Where a node input (or workflow output) gets its value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum Source {
  WorkflowInput { name: String },
  NodeOutput { node_id: String, output: String },
  Constant { literal: TypedLiteral },
}

/// A typed input binding; `ty` is the type the sink declares.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Binding {
  #[serde(rename = "type")]
  pub ty: LiteralType,
  pub source: Source,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputBinding {
  #[serde(rename = "type")]
  pub ty: LiteralType,
  pub source: Source,
}

/// A data dependency: output `output` of `from` feeds input `input` of `to`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Edge {
  pub from: String,
  pub output: String,
  pub to: String,
  pub input: String,
}
