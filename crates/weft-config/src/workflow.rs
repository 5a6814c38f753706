use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use weft_literal::{LiteralType, TypedLiteral};

use crate::identifier::Identifier;
use crate::retry::RetryPolicy;

/// A workflow as submitted for registration.
///
/// Nodes are invocations of registered tasks. Edges are not declared separately;
/// they are derived from input bindings that reference another node's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  pub id: Identifier,
  #[serde(default)]
  pub inputs: BTreeMap<String, LiteralType>,
  #[serde(default)]
  pub outputs: BTreeMap<String, OutputDef>,
  pub nodes: Vec<InvocationDef>,
  /// Default retry policy for nodes whose task declares none.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub retry: Option<RetryPolicy>,
}

impl WorkflowDef {
  pub fn new(id: Identifier) -> Self {
    Self {
      id,
      inputs: BTreeMap::new(),
      outputs: BTreeMap::new(),
      nodes: Vec::new(),
      retry: None,
    }
  }

  pub fn input(mut self, name: impl Into<String>, ty: LiteralType) -> Self {
    self.inputs.insert(name.into(), ty);
    self
  }

  pub fn output(mut self, name: impl Into<String>, ty: LiteralType, source: BindingDef) -> Self {
    self.outputs.insert(name.into(), OutputDef { ty, source });
    self
  }

  pub fn node(mut self, node: InvocationDef) -> Self {
    self.nodes.push(node);
    self
  }
}

/// One invocation of a registered task inside a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationDef {
  pub node_id: String,
  pub task: Identifier,
  #[serde(default)]
  pub inputs: BTreeMap<String, BindingDef>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub retry: Option<RetryPolicy>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
}

impl InvocationDef {
  pub fn new(node_id: impl Into<String>, task: Identifier) -> Self {
    Self {
      node_id: node_id.into(),
      task,
      inputs: BTreeMap::new(),
      retry: None,
      timeout_ms: None,
    }
  }

  pub fn bind(mut self, input: impl Into<String>, source: BindingDef) -> Self {
    self.inputs.insert(input.into(), source);
    self
  }
}

/// Source of a node input or a workflow output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum BindingDef {
  /// A workflow-level input.
  Input { name: String },
  /// A named output of another node.
  Node { node_id: String, output: String },
  Constant { literal: TypedLiteral },
}

impl BindingDef {
  pub fn input(name: impl Into<String>) -> Self {
    BindingDef::Input { name: name.into() }
  }

  pub fn node(node_id: impl Into<String>, output: impl Into<String>) -> Self {
    BindingDef::Node {
      node_id: node_id.into(),
      output: output.into(),
    }
  }

  pub fn constant(literal: TypedLiteral) -> Self {
    BindingDef::Constant { literal }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDef {
  #[serde(rename = "type")]
  pub ty: LiteralType,
  pub source: BindingDef,
}
