use serde::{Deserialize, Serialize};

use crate::identifier::Identifier;
use crate::launch_plan::LaunchPlanDef;
use crate::task::TaskDef;
use crate::workflow::WorkflowDef;

/// Any registrable definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Definition {
  Task(TaskDef),
  Workflow(WorkflowDef),
  LaunchPlan(LaunchPlanDef),
}

impl Definition {
  pub fn id(&self) -> &Identifier {
    match self {
      Definition::Task(def) => &def.id,
      Definition::Workflow(def) => &def.id,
      Definition::LaunchPlan(def) => &def.id,
    }
  }
}

/// A set of definitions registered together, e.g. read from a JSON file.
///
/// Registration order is tasks, then workflows, then launch plans.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
  #[serde(default)]
  pub tasks: Vec<TaskDef>,
  #[serde(default)]
  pub workflows: Vec<WorkflowDef>,
  #[serde(default)]
  pub launch_plans: Vec<LaunchPlanDef>,
}

impl Bundle {
  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }

  pub fn definitions(&self) -> impl Iterator<Item = Definition> + '_ {
    let tasks = self.tasks.iter().cloned().map(Definition::Task);
    let workflows = self.workflows.iter().cloned().map(Definition::Workflow);
    let plans = self.launch_plans.iter().cloned().map(Definition::LaunchPlan);
    tasks.chain(workflows).chain(plans)
  }
}
