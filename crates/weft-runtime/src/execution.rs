//! Per-execution state and the handle returned by launch.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;
use weft_config::Identifier;
use weft_literal::{LiteralError, LiteralMap, LiteralStore, SlotKey, TypedLiteral};
use weft_workflow::{Node, Source, WorkflowGraph};

use crate::error::RuntimeError;
use crate::events::{ExecutionEvent, ExecutionNotifier};
use crate::state::{
  ExecutionId, ExecutionPhase, ExecutionSnapshot, NodeState, NodeStatus, NodeTable,
};

/// Terminal bookkeeping, written once together with the terminal phase.
#[derive(Default)]
struct Outcome {
  outputs: Option<LiteralMap>,
  error: Option<RuntimeError>,
  completed_at: Option<DateTime<Utc>>,
}

/// Runtime state of one execution. Shared between the scheduler, its node tasks
/// and any handles.
pub(crate) struct Execution {
  pub(crate) id: ExecutionId,
  pub(crate) workflow: Arc<WorkflowGraph>,
  pub(crate) launch_plan: Option<Identifier>,
  pub(crate) nodes: NodeTable,
  pub(crate) cancel: CancellationToken,
  pub(crate) notifier: Arc<dyn ExecutionNotifier>,
  store: RwLock<LiteralStore>,
  phase: watch::Sender<ExecutionPhase>,
  outcome: Mutex<Outcome>,
  started_at: DateTime<Utc>,
}

impl Execution {
  pub(crate) fn new(
    id: ExecutionId,
    workflow: Arc<WorkflowGraph>,
    launch_plan: Option<Identifier>,
    store: LiteralStore,
    notifier: Arc<dyn ExecutionNotifier>,
  ) -> Self {
    let nodes = NodeTable::new(workflow.nodes.len());
    let (phase, _) = watch::channel(ExecutionPhase::Pending);
    Self {
      id,
      workflow,
      launch_plan,
      nodes,
      cancel: CancellationToken::new(),
      notifier,
      store: RwLock::new(store),
      phase,
      outcome: Mutex::new(Outcome::default()),
      started_at: Utc::now(),
    }
  }

  pub(crate) fn phase(&self) -> ExecutionPhase {
    *self.phase.borrow()
  }

  pub(crate) fn notify(&self, event: ExecutionEvent) {
    self.notifier.notify(event);
  }

  /// PENDING to RUNNING. Fails if the execution was aborted before it started.
  pub(crate) fn start(&self) -> bool {
    self.phase.send_if_modified(|phase| {
      if *phase == ExecutionPhase::Pending {
        *phase = ExecutionPhase::Running;
        true
      } else {
        false
      }
    })
  }

  /// Record the terminal outcome and publish the terminal phase.
  ///
  /// Returns false if another path (normally an abort) got there first.
  pub(crate) fn finish(
    &self,
    phase: ExecutionPhase,
    outputs: Option<LiteralMap>,
    error: Option<RuntimeError>,
  ) -> bool {
    let mut outcome = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
    if self.phase().is_terminal() {
      return false;
    }
    outcome.outputs = outputs;
    outcome.error = error;
    outcome.completed_at = Some(Utc::now());
    self.phase.send_replace(phase);
    true
  }

  /// Abort: cancel the token, mark every unfinished node ABORTED and publish
  /// ABORTED immediately. Running tasks are left to finish on their own; their
  /// results are discarded.
  pub(crate) fn abort(&self) -> bool {
    {
      let mut outcome = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
      if self.phase().is_terminal() {
        return false;
      }
      self.cancel.cancel();
      self.nodes.abort_all();
      outcome.error = Some(RuntimeError::Aborted {
        execution_id: self.id.clone(),
      });
      outcome.completed_at = Some(Utc::now());
      self.phase.send_replace(ExecutionPhase::Aborted);
    }

    info!(execution_id = %self.id, "execution_aborted");
    self.notify(ExecutionEvent::ExecutionAborted {
      execution_id: self.id.to_string(),
    });
    true
  }

  /// Read a node's inputs from the store, converted to the types it declares.
  pub(crate) fn read_inputs(&self, node: &Node) -> Result<LiteralMap, LiteralError> {
    let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
    node
      .inputs
      .iter()
      .map(|(name, binding)| {
        let literal = read_source(&store, &binding.source)?;
        Ok((name.clone(), literal.coerce_to(&binding.ty)?))
      })
      .collect()
  }

  pub(crate) fn write_outputs(&self, node: &Node, outputs: LiteralMap) {
    let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
    for (name, literal) in outputs {
      store.put(SlotKey::output(node.node_id.clone(), name), literal);
    }
  }

  /// Resolve the workflow's declared outputs from the store.
  pub(crate) fn resolve_outputs(&self) -> Result<LiteralMap, RuntimeError> {
    let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
    self
      .workflow
      .outputs
      .iter()
      .map(|(name, output)| {
        read_source(&store, &output.source)
          .and_then(|literal| literal.coerce_to(&output.ty))
          .map(|literal| (name.clone(), literal))
          .map_err(|e| RuntimeError::OutputResolution {
            name: name.clone(),
            message: e.to_string(),
          })
      })
      .collect()
  }

  pub(crate) fn literal(&self, key: &SlotKey) -> Result<TypedLiteral, LiteralError> {
    let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
    store.get(key).cloned()
  }

  pub(crate) fn snapshot(&self) -> ExecutionSnapshot {
    let outcome = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
    let phase = self.phase();

    let nodes = self
      .workflow
      .nodes
      .iter()
      .enumerate()
      .map(|(i, node)| {
        let status = NodeStatus {
          state: self.nodes.state(i),
          attempts: self.nodes.attempts(i),
          failure: self.nodes.failure(i),
        };
        (node.node_id.clone(), status)
      })
      .collect();

    ExecutionSnapshot {
      execution_id: self.id.clone(),
      workflow: self.workflow.id.clone(),
      launch_plan: self.launch_plan.clone(),
      phase,
      nodes,
      outputs: outcome.outputs.clone(),
      error: outcome.error.as_ref().map(ToString::to_string),
      started_at: self.started_at,
      completed_at: outcome.completed_at,
      failure: outcome.error.clone(),
    }
  }

  /// First failed node in topological order, as a runtime error.
  pub(crate) fn first_failure(&self) -> Option<RuntimeError> {
    (0..self.nodes.len())
      .filter(|&i| self.nodes.state(i) == NodeState::Failed)
      .find_map(|i| {
        self
          .nodes
          .failure(i)
          .map(|f| f.to_error(&self.workflow.nodes[i].node_id))
      })
  }

  pub(crate) async fn wait(&self) {
    let mut phase = self.phase.subscribe();
    // The sender lives in `self`, so the channel cannot close while we wait.
    let _ = phase.wait_for(|p| p.is_terminal()).await;
  }
}

fn read_source(store: &LiteralStore, source: &Source) -> Result<TypedLiteral, LiteralError> {
  match source {
    Source::WorkflowInput { name } => store.get(&SlotKey::input(name.clone())).cloned(),
    Source::NodeOutput { node_id, output } => store
      .get(&SlotKey::output(node_id.clone(), output.clone()))
      .cloned(),
    Source::Constant { literal } => Ok(literal.clone()),
  }
}

/// Handle to a launched execution.
///
/// Cheap to clone. Dropping every handle does not stop the execution.
#[derive(Clone)]
pub struct ExecutionHandle {
  execution: Arc<Execution>,
}

impl ExecutionHandle {
  pub(crate) fn new(execution: Arc<Execution>) -> Self {
    Self { execution }
  }

  pub fn id(&self) -> &ExecutionId {
    &self.execution.id
  }

  pub fn phase(&self) -> ExecutionPhase {
    self.execution.phase()
  }

  pub fn snapshot(&self) -> ExecutionSnapshot {
    self.execution.snapshot()
  }

  /// Wait until the execution reaches a terminal phase.
  pub async fn wait(&self) -> ExecutionSnapshot {
    self.execution.wait().await;
    self.execution.snapshot()
  }

  /// Abort the execution. Returns false if it had already finished.
  pub fn abort(&self) -> bool {
    self.execution.abort()
  }

  /// Read a slot of this execution's literal store.
  pub fn literal(&self, key: &SlotKey) -> Result<TypedLiteral, LiteralError> {
    self.execution.literal(key)
  }
}

impl std::fmt::Debug for ExecutionHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ExecutionHandle")
      .field("id", &self.execution.id)
      .field("phase", &self.execution.phase())
      .finish()
  }
}
