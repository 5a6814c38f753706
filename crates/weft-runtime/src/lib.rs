//! Weft Runtime
//!
//! Runs compiled workflow graphs. Each launch creates an execution that owns its
//! node state table and literal store; definitions are shared read-only. Nodes run
//! as soon as their producers are done, independent nodes concurrently, with
//! per-node retry, timeout and cooperative abort.

mod config;
mod error;
mod events;
mod execution;
mod runtime;
mod scheduler;
mod state;

pub use config::RuntimeConfig;
pub use error::RuntimeError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use execution::ExecutionHandle;
pub use runtime::{LaunchRequest, Runtime};
pub use state::{
  ExecutionId, ExecutionPhase, ExecutionSnapshot, NodeFailure, NodeState, NodeStatus,
};
