use serde::{Deserialize, Serialize};
use thiserror::Error;
use weft_literal::LiteralError;

/// Whether a failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  Transient,
  Permanent,
}

/// Errors returned by task code, or raised by the engine on a task's behalf.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
  /// A failure that may succeed on another attempt.
  #[error("{message}")]
  Transient { message: String },

  #[error("{message}")]
  Permanent { message: String },

  #[error("missing required input: {name}")]
  MissingInput { name: String },

  /// The task did not finish within its node's timeout.
  #[error("task timed out after {timeout_ms}ms")]
  Timeout { timeout_ms: u64 },

  #[error("task panicked: {message}")]
  Panicked { message: String },

  #[error("invalid literal: {message}")]
  Literal { message: String },
}

impl TaskError {
  pub fn transient(message: impl Into<String>) -> Self {
    TaskError::Transient {
      message: message.into(),
    }
  }

  pub fn permanent(message: impl Into<String>) -> Self {
    TaskError::Permanent {
      message: message.into(),
    }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      TaskError::Transient { .. } | TaskError::Timeout { .. } => ErrorKind::Transient,
      _ => ErrorKind::Permanent,
    }
  }

  pub fn is_transient(&self) -> bool {
    self.kind() == ErrorKind::Transient
  }
}

impl From<LiteralError> for TaskError {
  fn from(err: LiteralError) -> Self {
    TaskError::Literal {
      message: err.to_string(),
    }
  }
}

#[derive(Debug, Error)]
pub enum CatalogError {
  #[error("handler registered twice: {handler}")]
  DuplicateHandler { handler: String },
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_classification() {
    assert!(TaskError::transient("flaky").is_transient());
    assert!(TaskError::Timeout { timeout_ms: 5 }.is_transient());
    assert!(!TaskError::permanent("bad").is_transient());
    assert!(!TaskError::MissingInput { name: "x".into() }.is_transient());

    let err: TaskError = LiteralError::NonFiniteFloat.into();
    assert_eq!(err.kind(), ErrorKind::Permanent);
  }
}
