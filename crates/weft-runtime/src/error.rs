use thiserror::Error;
use weft_task::TaskError;

use crate::state::ExecutionId;

/// Errors raised by the execution engine.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
  /// A node failed permanently, either outright or after exhausting its retries.
  #[error("node '{node_id}' failed after {attempts} attempt(s): {source}")]
  NodeExecutionFailure {
    node_id: String,
    attempts: u32,
    retries_exhausted: bool,
    source: TaskError,
  },

  #[error("execution aborted: {execution_id}")]
  Aborted { execution_id: ExecutionId },

  #[error("execution not found: {execution_id}")]
  ExecutionNotFound { execution_id: ExecutionId },

  /// Execution has not reached a terminal phase yet.
  #[error("execution still running: {execution_id}")]
  NotFinished { execution_id: ExecutionId },

  #[error("invalid input '{name}': {message}")]
  InputBinding { name: String, message: String },

  #[error("failed to resolve workflow output '{name}': {message}")]
  OutputResolution { name: String, message: String },
}
