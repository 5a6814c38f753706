//! Launch plans: a compiled workflow bound to default and fixed inputs.

use std::sync::Arc;

use tracing::{info, instrument};
use weft_config::{Identifier, LaunchPlanDef};
use weft_literal::{LiteralError, LiteralMap, TypedLiteral};
use weft_registry::Registry;
use weft_runtime::{ExecutionHandle, ExecutionNotifier, LaunchRequest, NoopNotifier, Runtime};
use weft_workflow::WorkflowGraph;

use crate::error::LaunchError;

/// A registered launch plan.
///
/// Defaults and fixed inputs are stored already converted to the workflow's
/// declared input types.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
  pub id: Identifier,
  pub workflow: Arc<WorkflowGraph>,
  pub default_inputs: LiteralMap,
  pub fixed_inputs: LiteralMap,
}

impl LaunchPlan {
  /// Build a plan for `workflow`, type-checking every default and fixed input.
  pub fn new(
    id: Identifier,
    workflow: Arc<WorkflowGraph>,
    default_inputs: LiteralMap,
    fixed_inputs: LiteralMap,
  ) -> Result<Self, LaunchError> {
    if let Some(input) = default_inputs.keys().find(|k| fixed_inputs.contains_key(*k)) {
      return Err(LaunchError::FixedInputOverride {
        input: input.clone(),
      });
    }
    let default_inputs = check_inputs(&workflow, default_inputs)?;
    let fixed_inputs = check_inputs(&workflow, fixed_inputs)?;
    Ok(Self {
      id,
      workflow,
      default_inputs,
      fixed_inputs,
    })
  }

  /// Merge launch-time overrides over the plan's inputs.
  ///
  /// Overrides win over defaults, fixed inputs cannot be overridden, and every
  /// required workflow input must end up bound. Optional inputs left unbound are
  /// set to none.
  pub fn merge_inputs(&self, overrides: LiteralMap) -> Result<LiteralMap, LaunchError> {
    if let Some(input) = overrides.keys().find(|k| self.fixed_inputs.contains_key(*k)) {
      return Err(LaunchError::FixedInputOverride {
        input: input.clone(),
      });
    }

    let mut merged = self.default_inputs.clone();
    merged.extend(check_inputs(&self.workflow, overrides)?);
    merged.extend(self.fixed_inputs.clone());

    let missing: Vec<String> = self
      .workflow
      .required_inputs()
      .filter(|name| !merged.contains_key(*name))
      .map(String::from)
      .collect();
    if !missing.is_empty() {
      return Err(LaunchError::MissingInput { names: missing });
    }

    for (name, ty) in &self.workflow.inputs {
      if !merged.contains_key(name) {
        merged.insert(name.clone(), TypedLiteral::none(ty.clone()));
      }
    }
    Ok(merged)
  }
}

/// Check named inputs against the workflow's declared inputs and convert them to
/// the declared types.
fn check_inputs(workflow: &WorkflowGraph, inputs: LiteralMap) -> Result<LiteralMap, LaunchError> {
  inputs
    .into_iter()
    .map(|(name, literal)| {
      let Some(ty) = workflow.inputs.get(&name) else {
        return Err(LaunchError::UnknownInput { input: name });
      };
      match literal.coerce_to(ty) {
        Ok(literal) => Ok((name, literal)),
        Err(LiteralError::TypeMismatch { expected, found }) => Err(LaunchError::TypeMismatch {
          input: name,
          expected,
          found,
        }),
        Err(e) => Err(LaunchError::TypeMismatch {
          input: name,
          expected: ty.to_string(),
          found: e.to_string(),
        }),
      }
    })
    .collect()
}

/// Creates, fetches and launches launch plans.
pub struct LaunchPlanManager<W, P, N: ExecutionNotifier = NoopNotifier> {
  workflows: W,
  plans: P,
  runtime: Arc<Runtime<N>>,
}

impl<W, P, N> LaunchPlanManager<W, P, N>
where
  W: Registry<WorkflowGraph>,
  P: Registry<LaunchPlan>,
  N: ExecutionNotifier + 'static,
{
  pub fn new(workflows: W, plans: P, runtime: Arc<Runtime<N>>) -> Self {
    Self {
      workflows,
      plans,
      runtime,
    }
  }

  pub fn plans(&self) -> &P {
    &self.plans
  }

  /// Create and register a plan with default inputs only.
  pub async fn create(
    &self,
    id: Identifier,
    workflow: Identifier,
    default_inputs: LiteralMap,
  ) -> Result<Arc<LaunchPlan>, LaunchError> {
    let mut def = LaunchPlanDef::new(id, workflow);
    def.default_inputs = default_inputs;
    self.register(def).await
  }

  /// Create and register a plan from its definition.
  #[instrument(name = "launch_plan_register", skip(self, def), fields(launch_plan = %def.id))]
  pub async fn register(&self, def: LaunchPlanDef) -> Result<Arc<LaunchPlan>, LaunchError> {
    let LaunchPlanDef {
      id,
      workflow,
      default_inputs,
      fixed_inputs,
    } = def;

    let workflow = self.workflows.resolve(&workflow).await?;
    let plan = LaunchPlan::new(id.clone(), workflow, default_inputs, fixed_inputs)?;
    let plan = self.plans.register(id, plan).await?;

    info!(
      launch_plan = %plan.id,
      workflow = %plan.workflow.id,
      defaults = plan.default_inputs.len(),
      fixed = plan.fixed_inputs.len(),
      "launch_plan_registered"
    );
    Ok(plan)
  }

  pub async fn fetch(
    &self,
    project: &str,
    domain: &str,
    name: &str,
    version: &str,
  ) -> Result<Arc<LaunchPlan>, LaunchError> {
    let id = Identifier::new(project, domain, name, version);
    Ok(self.plans.resolve(&id).await?)
  }

  /// Start an execution of `plan`. No execution is created if the inputs are
  /// rejected.
  #[instrument(
    name = "launch_plan_launch",
    skip(self, plan, overrides),
    fields(launch_plan = %plan.id)
  )]
  pub fn launch(
    &self,
    plan: &LaunchPlan,
    overrides: LiteralMap,
  ) -> Result<ExecutionHandle, LaunchError> {
    let inputs = plan.merge_inputs(overrides)?;
    let request = LaunchRequest::new(
      plan.id.project.clone(),
      plan.id.domain.clone(),
      Arc::clone(&plan.workflow),
      inputs,
    )
    .with_launch_plan(plan.id.clone());

    let handle = self.runtime.launch(request)?;
    info!(
      launch_plan = %plan.id,
      execution_id = %handle.id(),
      "launch_plan_launched"
    );
    Ok(handle)
  }
}
