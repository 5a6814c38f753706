use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use weft_config::{BindingDef, InvocationDef, TaskDef, WorkflowDef};
use weft_literal::{LiteralType, TypedLiteral};
use weft_registry::{Registry, RegistryError};
use weft_workflow::{Binding, Edge, Node, OutputBinding, Source, WorkflowGraph};

use crate::cache::GraphCache;
use crate::error::CompileError;

/// Compiler turns a WorkflowDef into an immutable WorkflowGraph.
#[async_trait]
pub trait Compiler: Send + Sync {
  /// Compile a workflow definition.
  ///
  /// This process:
  /// 1. Resolves every invocation's task through the task registry
  /// 2. Binds each declared task input to exactly one type-checked source
  /// 3. Rejects cycles and orders nodes topologically
  /// 4. Fingerprints the result with a content digest
  async fn compile(&self, def: WorkflowDef) -> Result<Arc<WorkflowGraph>, CompileError>;
}

/// Standard compiler implementation backed by a task registry.
pub struct StandardCompiler<R> {
  tasks: R,
  cache: GraphCache,
}

/// Digest input: the definition plus every task it resolved to.
#[derive(Serialize)]
struct DigestInput<'a> {
  workflow: &'a WorkflowDef,
  tasks: Vec<&'a TaskDef>,
}

/// A node input or workflow output whose source has been checked.
struct ResolvedSource {
  source: Source,
  /// Producer node index and output name, for node-output sources.
  producer: Option<(usize, String)>,
}

impl<R> StandardCompiler<R>
where
  R: Registry<TaskDef>,
{
  pub fn new(tasks: R) -> Self {
    Self {
      tasks,
      cache: GraphCache::new(),
    }
  }

  pub fn cache(&self) -> &GraphCache {
    &self.cache
  }

  async fn resolve_tasks(&self, def: &WorkflowDef) -> Result<Vec<Arc<TaskDef>>, CompileError> {
    let mut tasks = Vec::with_capacity(def.nodes.len());
    for node in &def.nodes {
      let task = self.tasks.resolve(&node.task).await.map_err(|e| match e {
        RegistryError::NotFound { id } => CompileError::TaskNotFound {
          node_id: node.node_id.clone(),
          task: id,
        },
        other => CompileError::Registry(other),
      })?;
      tasks.push(task);
    }
    Ok(tasks)
  }
}

fn check_unique_node_ids(def: &WorkflowDef) -> Result<(), CompileError> {
  let mut seen = HashSet::new();
  for node in &def.nodes {
    if !seen.insert(node.node_id.as_str()) {
      return Err(CompileError::DuplicateNodeId {
        node_id: node.node_id.clone(),
      });
    }
  }
  Ok(())
}

fn content_digest(def: &WorkflowDef, tasks: &[Arc<TaskDef>]) -> Result<String, CompileError> {
  let input = DigestInput {
    workflow: def,
    tasks: tasks.iter().map(|t| t.as_ref()).collect(),
  };
  let bytes = serde_json::to_vec(&input)?;
  let mut hasher = Sha256::new();
  hasher.update(&bytes);
  Ok(hex::encode(hasher.finalize()))
}

/// Resolve a binding's source and check it against the sink type.
fn resolve_source(
  def: &WorkflowDef,
  index: &HashMap<&str, usize>,
  tasks: &[Arc<TaskDef>],
  site: &str,
  binding: &BindingDef,
  sink: &LiteralType,
) -> Result<ResolvedSource, CompileError> {
  let unknown = |reference: String| CompileError::UnknownReference {
    site: site.to_string(),
    reference,
  };
  let mismatch = |found: &LiteralType| CompileError::TypeMismatch {
    site: site.to_string(),
    expected: sink.to_string(),
    found: found.to_string(),
  };

  match binding {
    BindingDef::Input { name } => {
      let ty = def
        .inputs
        .get(name)
        .ok_or_else(|| unknown(format!("workflow input '{}'", name)))?;
      if !ty.is_assignable_to(sink) {
        return Err(mismatch(ty));
      }
      Ok(ResolvedSource {
        source: Source::WorkflowInput { name: name.clone() },
        producer: None,
      })
    }
    BindingDef::Node { node_id, output } => {
      let &producer = index
        .get(node_id.as_str())
        .ok_or_else(|| unknown(format!("node '{}'", node_id)))?;
      let ty = tasks[producer]
        .interface
        .outputs
        .get(output)
        .ok_or_else(|| unknown(format!("output '{}' of node '{}'", output, node_id)))?;
      if !ty.is_assignable_to(sink) {
        return Err(mismatch(ty));
      }
      Ok(ResolvedSource {
        source: Source::NodeOutput {
          node_id: node_id.clone(),
          output: output.clone(),
        },
        producer: Some((producer, output.clone())),
      })
    }
    BindingDef::Constant { literal } => {
      let literal = literal
        .coerce_to(sink)
        .map_err(|_| mismatch(literal.ty()))?;
      Ok(ResolvedSource {
        source: Source::Constant { literal },
        producer: None,
      })
    }
  }
}

/// Check for cycles using DFS. Returns the node at which a back edge was found.
fn detect_cycle(adjacency: &[Vec<usize>]) -> Option<usize> {
  // 0 = white (unvisited), 1 = gray (on the stack), 2 = black (done)
  fn dfs(node: usize, adjacency: &[Vec<usize>], color: &mut [u8]) -> Option<usize> {
    color[node] = 1;
    for &next in &adjacency[node] {
      match color[next] {
        1 => return Some(next),
        0 => {
          if let Some(found) = dfs(next, adjacency, color) {
            return Some(found);
          }
        }
        _ => {}
      }
    }
    color[node] = 2;
    None
  }

  let mut color = vec![0u8; adjacency.len()];
  for start in 0..adjacency.len() {
    if color[start] == 0 {
      if let Some(found) = dfs(start, adjacency, &mut color) {
        return Some(found);
      }
    }
  }
  None
}

/// Kahn's algorithm, always taking the earliest declared ready node.
fn topological_order(adjacency: &[Vec<usize>]) -> Vec<usize> {
  let mut indegree = vec![0usize; adjacency.len()];
  for targets in adjacency {
    for &t in targets {
      indegree[t] += 1;
    }
  }

  let mut ready: BinaryHeap<Reverse<usize>> = (0..adjacency.len())
    .filter(|&i| indegree[i] == 0)
    .map(Reverse)
    .collect();
  let mut order = Vec::with_capacity(adjacency.len());

  while let Some(Reverse(i)) = ready.pop() {
    order.push(i);
    for &t in &adjacency[i] {
      indegree[t] -= 1;
      if indegree[t] == 0 {
        ready.push(Reverse(t));
      }
    }
  }
  order
}

fn build_node(
  invocation: &InvocationDef,
  task: &TaskDef,
  def: &WorkflowDef,
  inputs: BTreeMap<String, Binding>,
) -> Node {
  Node {
    node_id: invocation.node_id.clone(),
    task: task.id.clone(),
    handler: task.handler.clone(),
    interface: task.interface.clone(),
    inputs,
    retry: invocation.retry.or(task.retry).or(def.retry),
    timeout_ms: invocation.timeout_ms.or(task.timeout_ms),
  }
}

fn compile_resolved(
  def: &WorkflowDef,
  tasks: &[Arc<TaskDef>],
  digest: String,
) -> Result<WorkflowGraph, CompileError> {
  let index: HashMap<&str, usize> = def
    .nodes
    .iter()
    .enumerate()
    .map(|(i, node)| (node.node_id.as_str(), i))
    .collect();

  let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); def.nodes.len()];
  let mut edges = Vec::new();
  let mut bound_inputs = Vec::with_capacity(def.nodes.len());

  for (i, invocation) in def.nodes.iter().enumerate() {
    let task = &tasks[i];
    let declared = &task.interface.inputs;

    if let Some(input) = invocation.inputs.keys().find(|k| !declared.contains_key(*k)) {
      return Err(CompileError::UnknownInput {
        node_id: invocation.node_id.clone(),
        input: input.clone(),
      });
    }

    let mut inputs = BTreeMap::new();
    for (name, sink) in declared {
      let Some(binding) = invocation.inputs.get(name) else {
        if sink.is_optional() {
          let literal = TypedLiteral::none(sink.clone());
          inputs.insert(
            name.clone(),
            Binding {
              ty: sink.clone(),
              source: Source::Constant { literal },
            },
          );
          continue;
        }
        return Err(CompileError::UnboundInput {
          node_id: invocation.node_id.clone(),
          input: name.clone(),
        });
      };

      let site = format!("{}.{}", invocation.node_id, name);
      let resolved = resolve_source(def, &index, tasks, &site, binding, sink)?;
      if let Some((producer, output)) = resolved.producer {
        if !adjacency[producer].contains(&i) {
          adjacency[producer].push(i);
        }
        edges.push(Edge {
          from: def.nodes[producer].node_id.clone(),
          output,
          to: invocation.node_id.clone(),
          input: name.clone(),
        });
      }
      inputs.insert(
        name.clone(),
        Binding {
          ty: sink.clone(),
          source: resolved.source,
        },
      );
    }
    bound_inputs.push(inputs);
  }

  if let Some(node) = detect_cycle(&adjacency) {
    return Err(CompileError::CyclicGraph {
      node_id: def.nodes[node].node_id.clone(),
    });
  }

  let mut outputs = BTreeMap::new();
  for (name, output) in &def.outputs {
    let site = format!("outputs.{}", name);
    let resolved = resolve_source(def, &index, tasks, &site, &output.source, &output.ty)?;
    outputs.insert(
      name.clone(),
      OutputBinding {
        ty: output.ty.clone(),
        source: resolved.source,
      },
    );
  }

  let order = topological_order(&adjacency);
  let mut bound_inputs: Vec<Option<BTreeMap<String, Binding>>> =
    bound_inputs.into_iter().map(Some).collect();
  let nodes = order
    .into_iter()
    .map(|i| {
      let inputs = bound_inputs[i].take().unwrap_or_default();
      build_node(&def.nodes[i], &tasks[i], def, inputs)
    })
    .collect();

  edges.sort();

  Ok(WorkflowGraph::new(
    def.id.clone(),
    digest,
    def.inputs.clone(),
    outputs,
    nodes,
    edges,
  ))
}

#[async_trait]
impl<R> Compiler for StandardCompiler<R>
where
  R: Registry<TaskDef>,
{
  #[instrument(name = "workflow_compile", skip(self, def), fields(workflow = %def.id))]
  async fn compile(&self, def: WorkflowDef) -> Result<Arc<WorkflowGraph>, CompileError> {
    check_unique_node_ids(&def)?;
    let tasks = self.resolve_tasks(&def).await?;
    let digest = content_digest(&def, &tasks)?;

    if let Some(graph) = self.cache.get(&digest) {
      debug!(digest = %digest, "compile_cache_hit");
      return Ok(graph);
    }

    let graph = compile_resolved(&def, &tasks, digest)?;
    info!(
      digest = %graph.digest,
      nodes = graph.nodes.len(),
      edges = graph.edges.len(),
      "workflow_compiled"
    );
    Ok(self.cache.insert(graph))
  }
}
