use std::sync::Arc;

use tracing::{info, instrument};
use weft_compiler::{Compiler, StandardCompiler};
use weft_config::{
  Bundle, Definition, Identifier, IdentifierFilter, LaunchPlanDef, TaskDef, WorkflowDef,
};
use weft_literal::LiteralMap;
use weft_registry::{InMemoryRegistry, Page, Registry, RegistryError};
use weft_runtime::{
  ExecutionHandle, ExecutionId, ExecutionNotifier, ExecutionSnapshot, NoopNotifier, Runtime,
  RuntimeConfig,
};
use weft_task::TaskCatalog;
use weft_workflow::WorkflowGraph;

use crate::error::ControlPlaneError;
use crate::launch_plan::{LaunchPlan, LaunchPlanManager};

type TaskRegistry = Arc<InMemoryRegistry<TaskDef>>;
type WorkflowRegistry = Arc<InMemoryRegistry<WorkflowGraph>>;
type PlanRegistry = Arc<InMemoryRegistry<LaunchPlan>>;

/// In-process control plane: registration, listing, launch and status.
///
/// Ties the registries, the compiler, the launch plan manager and the runtime
/// together. Workflows are compiled once, when they are registered.
pub struct ControlPlane<N: ExecutionNotifier = NoopNotifier> {
  tasks: TaskRegistry,
  workflows: WorkflowRegistry,
  compiler: StandardCompiler<TaskRegistry>,
  launch_plans: LaunchPlanManager<WorkflowRegistry, PlanRegistry, N>,
  runtime: Arc<Runtime<N>>,
}

impl ControlPlane<NoopNotifier> {
  pub fn new(catalog: TaskCatalog, config: RuntimeConfig) -> Self {
    Self::with_notifier(catalog, config, NoopNotifier)
  }
}

impl<N: ExecutionNotifier + 'static> ControlPlane<N> {
  pub fn with_notifier(catalog: TaskCatalog, config: RuntimeConfig, notifier: N) -> Self {
    let tasks: TaskRegistry = Arc::new(InMemoryRegistry::new());
    let workflows: WorkflowRegistry = Arc::new(InMemoryRegistry::new());
    let plans: PlanRegistry = Arc::new(InMemoryRegistry::new());
    let runtime = Arc::new(Runtime::with_notifier(Arc::new(catalog), config, notifier));

    Self {
      compiler: StandardCompiler::new(Arc::clone(&tasks)),
      launch_plans: LaunchPlanManager::new(Arc::clone(&workflows), plans, Arc::clone(&runtime)),
      tasks,
      workflows,
      runtime,
    }
  }

  pub fn catalog(&self) -> &TaskCatalog {
    self.runtime.catalog()
  }

  pub fn runtime(&self) -> &Runtime<N> {
    &self.runtime
  }

  pub fn launch_plans(&self) -> &LaunchPlanManager<WorkflowRegistry, PlanRegistry, N> {
    &self.launch_plans
  }

  // Registration

  /// Register any definition, returning its identifier.
  pub async fn register(&self, def: Definition) -> Result<Identifier, ControlPlaneError> {
    match def {
      Definition::Task(def) => Ok(self.register_task(def).await?.id.clone()),
      Definition::Workflow(def) => Ok(self.register_workflow(def).await?.id.clone()),
      Definition::LaunchPlan(def) => Ok(self.register_launch_plan(def).await?.id.clone()),
    }
  }

  /// Register every definition of a bundle in order, stopping at the first error.
  pub async fn register_bundle(
    &self,
    bundle: &Bundle,
  ) -> Result<Vec<Identifier>, ControlPlaneError> {
    let mut registered = Vec::new();
    for def in bundle.definitions() {
      registered.push(self.register(def).await?);
    }
    Ok(registered)
  }

  /// Register a task. Its handler must be in the catalog with the same interface.
  #[instrument(name = "task_register", skip(self, def), fields(task = %def.id))]
  pub async fn register_task(&self, def: TaskDef) -> Result<Arc<TaskDef>, ControlPlaneError> {
    let Some(entry) = self.catalog().get(&def.handler) else {
      return Err(ControlPlaneError::UnknownHandler {
        task: def.id,
        handler: def.handler,
      });
    };
    if entry.interface != def.interface {
      return Err(ControlPlaneError::InterfaceMismatch {
        task: def.id,
        handler: def.handler,
      });
    }

    let task = self.tasks.register(def.id.clone(), def).await?;
    info!(task = %task.id, handler = %task.handler, "task_registered");
    Ok(task)
  }

  /// Compile and register a workflow, together with a default launch plan under
  /// the same identifier.
  #[instrument(name = "workflow_register", skip(self, def), fields(workflow = %def.id))]
  pub async fn register_workflow(
    &self,
    def: WorkflowDef,
  ) -> Result<Arc<WorkflowGraph>, ControlPlaneError> {
    let id = def.id.clone();
    // The default plan shares this identifier, so a taken plan id rejects the
    // workflow before anything is registered.
    match self.launch_plans.plans().resolve(&id).await {
      Err(RegistryError::NotFound { .. }) => {}
      Ok(_) => return Err(RegistryError::DuplicateIdentifier { id }.into()),
      Err(e) => return Err(e.into()),
    }

    let graph = self.compiler.compile(def).await?;
    let graph = self
      .workflows
      .register(id.clone(), Arc::unwrap_or_clone(graph))
      .await?;
    info!(workflow = %graph.id, digest = %graph.digest, "workflow_registered");

    self
      .launch_plans
      .register(LaunchPlanDef::new(id.clone(), id))
      .await?;
    Ok(graph)
  }

  pub async fn register_launch_plan(
    &self,
    def: LaunchPlanDef,
  ) -> Result<Arc<LaunchPlan>, ControlPlaneError> {
    Ok(self.launch_plans.register(def).await?)
  }

  // Lookup

  pub async fn get_task(&self, id: &Identifier) -> Result<Arc<TaskDef>, ControlPlaneError> {
    Ok(self.tasks.resolve(id).await?)
  }

  pub async fn get_workflow(
    &self,
    id: &Identifier,
  ) -> Result<Arc<WorkflowGraph>, ControlPlaneError> {
    Ok(self.workflows.resolve(id).await?)
  }

  pub async fn get_launch_plan(
    &self,
    id: &Identifier,
  ) -> Result<Arc<LaunchPlan>, ControlPlaneError> {
    Ok(self.launch_plans.plans().resolve(id).await?)
  }

  pub async fn list_tasks(
    &self,
    filter: &IdentifierFilter,
    limit: usize,
    token: Option<&str>,
  ) -> Result<Page<TaskDef>, ControlPlaneError> {
    Ok(self.tasks.list(filter, limit, token).await?)
  }

  pub async fn list_workflows(
    &self,
    filter: &IdentifierFilter,
    limit: usize,
    token: Option<&str>,
  ) -> Result<Page<WorkflowGraph>, ControlPlaneError> {
    Ok(self.workflows.list(filter, limit, token).await?)
  }

  pub async fn list_launch_plans(
    &self,
    filter: &IdentifierFilter,
    limit: usize,
    token: Option<&str>,
  ) -> Result<Page<LaunchPlan>, ControlPlaneError> {
    Ok(self.launch_plans.plans().list(filter, limit, token).await?)
  }

  // Executions

  /// Launch the plan `project/domain/name@version` and return immediately.
  pub async fn launch(
    &self,
    project: &str,
    domain: &str,
    name: &str,
    version: &str,
    inputs: LiteralMap,
  ) -> Result<ExecutionId, ControlPlaneError> {
    let plan = self
      .launch_plans
      .fetch(project, domain, name, version)
      .await?;
    let handle = self.launch_plans.launch(&plan, inputs)?;
    Ok(handle.id().clone())
  }

  pub fn handle(&self, execution_id: &ExecutionId) -> Result<ExecutionHandle, ControlPlaneError> {
    Ok(self.runtime.handle(execution_id)?)
  }

  pub fn status(&self, execution_id: &ExecutionId) -> Result<ExecutionSnapshot, ControlPlaneError> {
    Ok(self.runtime.status(execution_id)?)
  }

  /// Wait for an execution to reach a terminal phase.
  pub async fn wait(
    &self,
    execution_id: &ExecutionId,
  ) -> Result<ExecutionSnapshot, ControlPlaneError> {
    let handle = self.runtime.handle(execution_id)?;
    Ok(handle.wait().await)
  }

  pub fn abort(&self, execution_id: &ExecutionId) -> Result<bool, ControlPlaneError> {
    Ok(self.runtime.abort(execution_id)?)
  }

  /// Drop a finished execution, returning its final snapshot.
  pub fn forget(&self, execution_id: &ExecutionId) -> Result<ExecutionSnapshot, ControlPlaneError> {
    Ok(self.runtime.forget(execution_id)?)
  }

  pub fn executions(&self, project: &str, domain: &str) -> Vec<ExecutionSnapshot> {
    self.runtime.executions(project, domain)
  }
}
