//! Compiled graph caching.
//!
//! Graphs are keyed by content digest. Compiling an identical definition against
//! identical tasks returns the graph built the first time.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use weft_workflow::WorkflowGraph;

#[derive(Clone, Default)]
pub struct GraphCache {
  graphs: Arc<RwLock<HashMap<String, Arc<WorkflowGraph>>>>,
}

impl GraphCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, digest: &str) -> Option<Arc<WorkflowGraph>> {
    let graphs = self.graphs.read().unwrap_or_else(PoisonError::into_inner);
    graphs.get(digest).cloned()
  }

  /// Insert `graph` unless a graph with the same digest is already cached, and
  /// return whichever ends up cached.
  pub fn insert(&self, graph: WorkflowGraph) -> Arc<WorkflowGraph> {
    let mut graphs = self.graphs.write().unwrap_or_else(PoisonError::into_inner);
    graphs
      .entry(graph.digest.clone())
      .or_insert_with(|| Arc::new(graph))
      .clone()
  }

  pub fn len(&self) -> usize {
    self
      .graphs
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn clear(&self) {
    let mut graphs = self.graphs.write().unwrap_or_else(PoisonError::into_inner);
    graphs.clear();
  }
}
