use std::collections::{HashMap, VecDeque};

use crate::node::{Edge, Node};

/// Index-based adjacency over a workflow's nodes.
///
/// Node indices follow the order of the slice the graph was built from. Parallel
/// edges between the same pair of nodes are collapsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
  index: HashMap<String, usize>,
  downstream: Vec<Vec<usize>>,
  upstream: Vec<Vec<usize>>,
}

impl Graph {
  /// Build a graph from nodes and edges. Edges naming unknown nodes are ignored.
  pub fn new(nodes: &[Node], edges: &[Edge]) -> Self {
    let index: HashMap<String, usize> = nodes
      .iter()
      .enumerate()
      .map(|(i, node)| (node.node_id.clone(), i))
      .collect();

    let mut downstream = vec![Vec::new(); nodes.len()];
    let mut upstream = vec![Vec::new(); nodes.len()];

    for edge in edges {
      let (Some(&from), Some(&to)) = (index.get(&edge.from), index.get(&edge.to)) else {
        continue;
      };
      if !downstream[from].contains(&to) {
        downstream[from].push(to);
        upstream[to].push(from);
      }
    }

    Self {
      index,
      downstream,
      upstream,
    }
  }

  pub fn len(&self) -> usize {
    self.downstream.len()
  }

  pub fn is_empty(&self) -> bool {
    self.downstream.is_empty()
  }

  pub fn index_of(&self, node_id: &str) -> Option<usize> {
    self.index.get(node_id).copied()
  }

  /// Distinct producers feeding node `i`.
  pub fn upstream(&self, i: usize) -> &[usize] {
    self.upstream.get(i).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Distinct consumers of node `i`.
  pub fn downstream(&self, i: usize) -> &[usize] {
    self.downstream.get(i).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Nodes with no upstream producers.
  pub fn entry_points(&self) -> Vec<usize> {
    (0..self.len())
      .filter(|&i| self.upstream[i].is_empty())
      .collect()
  }

  /// Every node reachable from `i`, excluding `i`, in ascending index order.
  pub fn transitive_downstream(&self, i: usize) -> Vec<usize> {
    let mut seen = vec![false; self.len()];
    let mut queue: VecDeque<usize> = self.downstream(i).iter().copied().collect();

    while let Some(next) = queue.pop_front() {
      if std::mem::replace(&mut seen[next], true) {
        continue;
      }
      queue.extend(self.downstream(next).iter().copied());
    }

    (0..self.len()).filter(|&j| seen[j] && j != i).collect()
  }
}
