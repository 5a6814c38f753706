//! Weft Engine
//!
//! The control-plane facade over the other weft crates:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ControlPlane                          │
//! │  - register / register_bundle (tasks, workflows, plans)     │
//! │  - list_tasks / list_workflows / list_launch_plans          │
//! │  - launch / status / wait / abort                           │
//! └─────────────────────────────────────────────────────────────┘
//!          │                    │                     │
//!          ▼                    ▼                     ▼
//! ┌─────────────────┐ ┌───────────────────┐ ┌─────────────────────┐
//! │ StandardCompiler│ │ LaunchPlanManager │ │      Runtime        │
//! │ compile once at │ │ merge defaults,   │ │ one scheduler per   │
//! │ registration    │ │ overrides, fixed  │ │ execution           │
//! └─────────────────┘ └───────────────────┘ └─────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let control = ControlPlane::new(catalog, RuntimeConfig::default());
//! control.register_bundle(&bundle).await?;
//!
//! let id = control.launch("proj", "dev", "pandera_workflow", "v1", inputs).await?;
//! let snapshot = control.wait(&id).await?;
//! ```

mod control_plane;
mod error;
mod launch_plan;

pub use control_plane::ControlPlane;
pub use error::{ControlPlaneError, LaunchError};
pub use launch_plan::{LaunchPlan, LaunchPlanManager};
