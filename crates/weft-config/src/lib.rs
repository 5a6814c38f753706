//! Weft Config
//!
//! Serializable definitions as they are submitted for registration: tasks, workflows
//! and launch plans, each keyed by an [`Identifier`]. These are the types a bundle
//! file is read into. Workflow definitions are compiled into an immutable graph by
//! the compiler before anything runs.

mod bundle;
mod identifier;
mod launch_plan;
mod retry;
mod task;
mod workflow;

pub use bundle::{Bundle, Definition};
pub use identifier::{Identifier, IdentifierFilter};
pub use launch_plan::LaunchPlanDef;
pub use retry::{RetryBackoff, RetryPolicy};
pub use task::TaskDef;
pub use workflow::{BindingDef, InvocationDef, OutputDef, WorkflowDef};
