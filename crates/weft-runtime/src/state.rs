use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use weft_config::Identifier;
use weft_literal::LiteralMap;
use weft_task::{ErrorKind, TaskError};

use crate::error::RuntimeError;

/// Identifies one execution: `project/domain/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExecutionId {
  pub project: String,
  pub domain: String,
  pub name: String,
}

impl ExecutionId {
  pub fn new(
    project: impl Into<String>,
    domain: impl Into<String>,
    name: impl Into<String>,
  ) -> Self {
    Self {
      project: project.into(),
      domain: domain.into(),
      name: name.into(),
    }
  }

  /// A fresh id with a random name.
  pub fn generate(project: impl Into<String>, domain: impl Into<String>) -> Self {
    Self::new(project, domain, uuid::Uuid::new_v4().simple().to_string())
  }
}

impl fmt::Display for ExecutionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}/{}", self.project, self.domain, self.name)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionPhase {
  Pending,
  Running,
  Succeeded,
  Failed,
  Aborted,
}

impl ExecutionPhase {
  pub fn is_terminal(self) -> bool {
    matches!(
      self,
      ExecutionPhase::Succeeded | ExecutionPhase::Failed | ExecutionPhase::Aborted
    )
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum NodeState {
  Waiting = 0,
  Ready = 1,
  Running = 2,
  Done = 3,
  Failed = 4,
  Skipped = 5,
  Aborted = 6,
}

impl NodeState {
  pub fn is_terminal(self) -> bool {
    matches!(
      self,
      NodeState::Done | NodeState::Failed | NodeState::Skipped | NodeState::Aborted
    )
  }

  fn from_u8(value: u8) -> Self {
    match value {
      0 => NodeState::Waiting,
      1 => NodeState::Ready,
      2 => NodeState::Running,
      3 => NodeState::Done,
      4 => NodeState::Failed,
      5 => NodeState::Skipped,
      _ => NodeState::Aborted,
    }
  }
}

/// Why a node ended up FAILED.
#[derive(Debug, Clone, Serialize)]
pub struct NodeFailure {
  pub kind: ErrorKind,
  pub message: String,
  pub attempts: u32,
  /// The last error was transient but no attempts were left.
  pub retries_exhausted: bool,
  #[serde(skip)]
  pub(crate) cause: TaskError,
}

impl NodeFailure {
  pub(crate) fn new(cause: TaskError, attempts: u32, retries_exhausted: bool) -> Self {
    Self {
      kind: cause.kind(),
      message: cause.to_string(),
      attempts,
      retries_exhausted,
      cause,
    }
  }

  pub fn cause(&self) -> &TaskError {
    &self.cause
  }

  pub(crate) fn to_error(&self, node_id: &str) -> RuntimeError {
    RuntimeError::NodeExecutionFailure {
      node_id: node_id.to_string(),
      attempts: self.attempts,
      retries_exhausted: self.retries_exhausted,
      source: self.cause.clone(),
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeStatus {
  pub state: NodeState,
  pub attempts: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub failure: Option<NodeFailure>,
}

/// Point-in-time view of an execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSnapshot {
  pub execution_id: ExecutionId,
  pub workflow: Identifier,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub launch_plan: Option<Identifier>,
  pub phase: ExecutionPhase,
  pub nodes: BTreeMap<String, NodeStatus>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub outputs: Option<LiteralMap>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  pub started_at: DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub completed_at: Option<DateTime<Utc>>,
  #[serde(skip)]
  pub(crate) failure: Option<RuntimeError>,
}

impl ExecutionSnapshot {
  pub fn node(&self, node_id: &str) -> Option<&NodeStatus> {
    self.nodes.get(node_id)
  }

  /// Workflow outputs of a succeeded execution, or the error that ended it.
  pub fn into_result(self) -> Result<LiteralMap, RuntimeError> {
    match self.phase {
      ExecutionPhase::Succeeded => Ok(self.outputs.unwrap_or_default()),
      ExecutionPhase::Aborted => Err(RuntimeError::Aborted {
        execution_id: self.execution_id,
      }),
      ExecutionPhase::Failed => Err(self.failure.unwrap_or(RuntimeError::NotFinished {
        execution_id: self.execution_id,
      })),
      ExecutionPhase::Pending | ExecutionPhase::Running => Err(RuntimeError::NotFinished {
        execution_id: self.execution_id,
      }),
    }
  }
}

struct NodeSlot {
  state: AtomicU8,
  attempts: AtomicU32,
  failure: Mutex<Option<NodeFailure>>,
}

/// Per-node runtime state of one execution.
///
/// Every state change is a compare-and-set, so concurrent writers (a node task
/// finishing, an abort, a failure skipping dependents) never overwrite each other.
pub(crate) struct NodeTable {
  slots: Vec<NodeSlot>,
}

impl NodeTable {
  pub(crate) fn new(len: usize) -> Self {
    let slots = (0..len)
      .map(|_| NodeSlot {
        state: AtomicU8::new(NodeState::Waiting as u8),
        attempts: AtomicU32::new(0),
        failure: Mutex::new(None),
      })
      .collect();
    Self { slots }
  }

  pub(crate) fn state(&self, i: usize) -> NodeState {
    NodeState::from_u8(self.slots[i].state.load(Ordering::Acquire))
  }

  pub(crate) fn transition(&self, i: usize, from: NodeState, to: NodeState) -> bool {
    self.slots[i]
      .state
      .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }

  /// Move every non-terminal node to ABORTED, returning the indices moved.
  pub(crate) fn abort_all(&self) -> Vec<usize> {
    let mut aborted = Vec::new();
    for i in 0..self.slots.len() {
      loop {
        let current = self.state(i);
        if current.is_terminal() {
          break;
        }
        if self.transition(i, current, NodeState::Aborted) {
          aborted.push(i);
          break;
        }
      }
    }
    aborted
  }

  pub(crate) fn set_attempts(&self, i: usize, attempts: u32) {
    self.slots[i].attempts.store(attempts, Ordering::Release);
  }

  pub(crate) fn attempts(&self, i: usize) -> u32 {
    self.slots[i].attempts.load(Ordering::Acquire)
  }

  pub(crate) fn set_failure(&self, i: usize, failure: NodeFailure) {
    let mut slot = self.slots[i]
      .failure
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    *slot = Some(failure);
  }

  pub(crate) fn failure(&self, i: usize) -> Option<NodeFailure> {
    self.slots[i]
      .failure
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  pub(crate) fn len(&self) -> usize {
    self.slots.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_transitions_are_compare_and_set() {
    let table = NodeTable::new(2);
    assert_eq!(table.state(0), NodeState::Waiting);

    assert!(table.transition(0, NodeState::Waiting, NodeState::Ready));
    assert!(!table.transition(0, NodeState::Waiting, NodeState::Ready));
    assert!(table.transition(0, NodeState::Ready, NodeState::Running));
    assert_eq!(table.state(0), NodeState::Running);
  }

  #[test]
  fn test_abort_all_leaves_terminal_nodes() {
    let table = NodeTable::new(3);
    table.transition(0, NodeState::Waiting, NodeState::Ready);
    table.transition(0, NodeState::Ready, NodeState::Running);
    table.transition(0, NodeState::Running, NodeState::Done);
    table.transition(1, NodeState::Waiting, NodeState::Ready);

    assert_eq!(table.abort_all(), vec![1, 2]);
    assert_eq!(table.state(0), NodeState::Done);
    assert_eq!(table.state(1), NodeState::Aborted);
    assert_eq!(table.state(2), NodeState::Aborted);
  }

  #[test]
  fn test_execution_id_display() {
    let id = ExecutionId::new("p", "d", "abc");
    assert_eq!(id.to_string(), "p/d/abc");
    assert_eq!(ExecutionId::generate("p", "d").name.len(), 32);
  }
}
