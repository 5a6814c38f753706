use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Semaphore;
use tracing::{info, instrument};
use weft_config::Identifier;
use weft_literal::{LiteralMap, LiteralStore, SlotKey, TypedLiteral};
use weft_task::TaskCatalog;
use weft_workflow::WorkflowGraph;

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::events::{ExecutionNotifier, NoopNotifier};
use crate::execution::{Execution, ExecutionHandle};
use crate::scheduler::Scheduler;
use crate::state::{ExecutionId, ExecutionSnapshot};

/// Everything needed to start one execution.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
  pub project: String,
  pub domain: String,
  pub workflow: Arc<WorkflowGraph>,
  /// Launch plan the request came through, if any. Recorded on the execution.
  pub launch_plan: Option<Identifier>,
  /// Fully merged workflow inputs.
  pub inputs: LiteralMap,
}

impl LaunchRequest {
  pub fn new(
    project: impl Into<String>,
    domain: impl Into<String>,
    workflow: Arc<WorkflowGraph>,
    inputs: LiteralMap,
  ) -> Self {
    Self {
      project: project.into(),
      domain: domain.into(),
      workflow,
      launch_plan: None,
      inputs,
    }
  }

  pub fn with_launch_plan(mut self, launch_plan: Identifier) -> Self {
    self.launch_plan = Some(launch_plan);
    self
  }
}

/// The execution engine.
///
/// Owns every execution it launched. Executions are independent: each has its own
/// node table and literal store and shares only the read-only workflow graph.
pub struct Runtime<N: ExecutionNotifier = NoopNotifier> {
  catalog: Arc<TaskCatalog>,
  config: RuntimeConfig,
  notifier: Arc<N>,
  permits: Option<Arc<Semaphore>>,
  executions: RwLock<HashMap<ExecutionId, Arc<Execution>>>,
}

impl Runtime<NoopNotifier> {
  pub fn new(catalog: Arc<TaskCatalog>, config: RuntimeConfig) -> Self {
    Self::with_notifier(catalog, config, NoopNotifier)
  }
}

impl<N: ExecutionNotifier + 'static> Runtime<N> {
  pub fn with_notifier(catalog: Arc<TaskCatalog>, config: RuntimeConfig, notifier: N) -> Self {
    let permits = config
      .max_parallelism
      .map(|limit| Arc::new(Semaphore::new(limit.max(1))));
    Self {
      catalog,
      config,
      notifier: Arc::new(notifier),
      permits,
      executions: RwLock::new(HashMap::new()),
    }
  }

  pub fn catalog(&self) -> &Arc<TaskCatalog> {
    &self.catalog
  }

  pub fn config(&self) -> &RuntimeConfig {
    &self.config
  }

  /// Start a new execution and return immediately.
  ///
  /// Inputs are checked against the workflow's declared input types; optional
  /// inputs left unbound are set to none. Must be called within a tokio runtime.
  #[instrument(
    name = "execution_launch",
    skip(self, request),
    fields(workflow = %request.workflow.id)
  )]
  pub fn launch(&self, request: LaunchRequest) -> Result<ExecutionHandle, RuntimeError> {
    let LaunchRequest {
      project,
      domain,
      workflow,
      launch_plan,
      inputs,
    } = request;

    let store = bind_inputs(&workflow, inputs)?;
    let id = ExecutionId::generate(project, domain);
    let notifier: Arc<dyn ExecutionNotifier> = self.notifier.clone();
    let execution = Arc::new(Execution::new(
      id.clone(),
      workflow,
      launch_plan,
      store,
      notifier,
    ));

    {
      let mut executions = self
        .executions
        .write()
        .unwrap_or_else(PoisonError::into_inner);
      executions.insert(id.clone(), Arc::clone(&execution));
    }

    info!(
      execution_id = %id,
      workflow = %execution.workflow.id,
      "execution_launched"
    );

    let scheduler = Arc::new(Scheduler::new(
      Arc::clone(&execution),
      Arc::clone(&self.catalog),
      self.config.default_retry,
      self.permits.clone(),
    ));
    tokio::spawn(scheduler.run());

    Ok(ExecutionHandle::new(execution))
  }

  pub fn handle(&self, execution_id: &ExecutionId) -> Result<ExecutionHandle, RuntimeError> {
    self.execution(execution_id).map(ExecutionHandle::new)
  }

  /// Current state of an execution. Never blocks on running nodes.
  pub fn status(&self, execution_id: &ExecutionId) -> Result<ExecutionSnapshot, RuntimeError> {
    self.execution(execution_id).map(|e| e.snapshot())
  }

  /// Abort an execution. Returns false if it had already finished.
  pub fn abort(&self, execution_id: &ExecutionId) -> Result<bool, RuntimeError> {
    self.execution(execution_id).map(|e| e.abort())
  }

  /// Drop a finished execution from the runtime, returning its final snapshot.
  ///
  /// Executions are kept until forgotten. Handles already given out keep working.
  pub fn forget(&self, execution_id: &ExecutionId) -> Result<ExecutionSnapshot, RuntimeError> {
    let mut executions = self
      .executions
      .write()
      .unwrap_or_else(PoisonError::into_inner);
    let Some(execution) = executions.get(execution_id) else {
      return Err(RuntimeError::ExecutionNotFound {
        execution_id: execution_id.clone(),
      });
    };
    if !execution.phase().is_terminal() {
      return Err(RuntimeError::NotFinished {
        execution_id: execution_id.clone(),
      });
    }
    let snapshot = execution.snapshot();
    executions.remove(execution_id);
    info!(execution_id = %execution_id, "execution_forgotten");
    Ok(snapshot)
  }

  /// Snapshots of every execution launched under `project/domain`, oldest first.
  pub fn executions(&self, project: &str, domain: &str) -> Vec<ExecutionSnapshot> {
    let executions = self
      .executions
      .read()
      .unwrap_or_else(PoisonError::into_inner);
    let mut snapshots: Vec<_> = executions
      .values()
      .filter(|e| e.id.project == project && e.id.domain == domain)
      .map(|e| e.snapshot())
      .collect();
    snapshots.sort_by(|a, b| {
      a.started_at
        .cmp(&b.started_at)
        .then_with(|| a.execution_id.cmp(&b.execution_id))
    });
    snapshots
  }

  fn execution(&self, execution_id: &ExecutionId) -> Result<Arc<Execution>, RuntimeError> {
    let executions = self
      .executions
      .read()
      .unwrap_or_else(PoisonError::into_inner);
    executions
      .get(execution_id)
      .cloned()
      .ok_or_else(|| RuntimeError::ExecutionNotFound {
        execution_id: execution_id.clone(),
      })
  }
}

/// Seed an execution's store with its workflow inputs.
fn bind_inputs(workflow: &WorkflowGraph, inputs: LiteralMap) -> Result<LiteralStore, RuntimeError> {
  if let Some(name) = inputs.keys().find(|name| !workflow.inputs.contains_key(*name)) {
    return Err(RuntimeError::InputBinding {
      name: name.clone(),
      message: "workflow declares no such input".to_string(),
    });
  }

  let mut inputs = inputs;
  let mut store = LiteralStore::new();
  for (name, ty) in &workflow.inputs {
    let literal = match inputs.remove(name) {
      Some(literal) => literal
        .coerce_to(ty)
        .map_err(|e| RuntimeError::InputBinding {
          name: name.clone(),
          message: e.to_string(),
        })?,
      None if ty.is_optional() => TypedLiteral::none(ty.clone()),
      None => {
        return Err(RuntimeError::InputBinding {
          name: name.clone(),
          message: "required input is missing".to_string(),
        });
      }
    };
    store.put(SlotKey::input(name.clone()), literal);
  }
  Ok(store)
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use super::*;
  use weft_literal::LiteralType;

  fn make_graph() -> WorkflowGraph {
    WorkflowGraph::new(
      Identifier::new("p", "d", "wf", "v1"),
      String::new(),
      BTreeMap::from([
        ("rate".to_string(), LiteralType::Float),
        ("note".to_string(), LiteralType::optional(LiteralType::String)),
      ]),
      BTreeMap::new(),
      Vec::new(),
      Vec::new(),
    )
  }

  #[test]
  fn test_bind_inputs_coerces_and_defaults_optional() {
    let inputs = LiteralMap::from([("rate".to_string(), TypedLiteral::integer(2))]);
    let store = bind_inputs(&make_graph(), inputs).unwrap();

    let rate = store.get(&SlotKey::input("rate")).unwrap();
    assert_eq!(rate.ty(), &LiteralType::Float);
    let note = store.get(&SlotKey::input("note")).unwrap();
    assert_eq!(note.ty(), &LiteralType::optional(LiteralType::String));
  }

  #[test]
  fn test_bind_inputs_rejects_missing_unknown_and_mistyped() {
    let err = bind_inputs(&make_graph(), LiteralMap::new()).unwrap_err();
    assert!(matches!(err, RuntimeError::InputBinding { ref name, .. } if name == "rate"));

    let inputs = LiteralMap::from([
      ("rate".to_string(), TypedLiteral::float(1.0)),
      ("extra".to_string(), TypedLiteral::integer(1)),
    ]);
    let err = bind_inputs(&make_graph(), inputs).unwrap_err();
    assert!(matches!(err, RuntimeError::InputBinding { ref name, .. } if name == "extra"));

    let inputs = LiteralMap::from([("rate".to_string(), TypedLiteral::string("fast"))]);
    assert!(bind_inputs(&make_graph(), inputs).is_err());
  }
}
