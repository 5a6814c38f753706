use std::collections::BTreeMap;

use serde::Serialize;
use weft_config::Identifier;
use weft_literal::LiteralType;

use crate::graph::Graph;
use crate::node::{Edge, Node, OutputBinding};

/// A compiled workflow, ready to be launched any number of times.
///
/// Immutable once built and shared across executions. `nodes` are in a
/// deterministic topological order and `edges` are sorted, so two graphs compiled
/// from the same definition compare equal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowGraph {
  pub id: Identifier,
  /// Hex SHA-256 over the definition and the resolved tasks.
  pub digest: String,
  pub inputs: BTreeMap<String, LiteralType>,
  pub outputs: BTreeMap<String, OutputBinding>,
  pub nodes: Vec<Node>,
  pub edges: Vec<Edge>,
  #[serde(skip)]
  graph: Graph,
}

impl WorkflowGraph {
  pub fn new(
    id: Identifier,
    digest: String,
    inputs: BTreeMap<String, LiteralType>,
    outputs: BTreeMap<String, OutputBinding>,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
  ) -> Self {
    let graph = Graph::new(&nodes, &edges);
    Self {
      id,
      digest,
      inputs,
      outputs,
      nodes,
      edges,
      graph,
    }
  }

  pub fn graph(&self) -> &Graph {
    &self.graph
  }

  pub fn node(&self, node_id: &str) -> Option<&Node> {
    self.graph.index_of(node_id).map(|i| &self.nodes[i])
  }

  /// Inputs that must be bound at launch.
  pub fn required_inputs(&self) -> impl Iterator<Item = &str> {
    self
      .inputs
      .iter()
      .filter(|(_, ty)| !ty.is_optional())
      .map(|(name, _)| name.as_str())
  }
}
