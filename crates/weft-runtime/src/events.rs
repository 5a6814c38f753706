//! Execution events and notifiers for observability.
//!
//! Events are emitted as executions and their nodes change state, so consumers can
//! persist history, stream progress, or assert on ordering in tests.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
  ExecutionStarted {
    execution_id: String,
    workflow: String,
  },

  NodeStarted {
    execution_id: String,
    node_id: String,
  },

  /// A transient failure will be retried after a back-off delay.
  NodeRetrying {
    execution_id: String,
    node_id: String,
    attempt: u32,
    error: String,
  },

  NodeCompleted {
    execution_id: String,
    node_id: String,
  },

  NodeFailed {
    execution_id: String,
    node_id: String,
    error: String,
  },

  /// The node will never run because an upstream node failed.
  NodeSkipped {
    execution_id: String,
    node_id: String,
  },

  /// A node finished after its execution was aborted; its outputs were dropped.
  NodeResultDiscarded {
    execution_id: String,
    node_id: String,
  },

  ExecutionSucceeded {
    execution_id: String,
  },

  ExecutionFailed {
    execution_id: String,
    error: String,
  },

  ExecutionAborted {
    execution_id: String,
  },
}

/// Trait for receiving execution events.
///
/// Called synchronously from the scheduler and node tasks; implementations must
/// not block.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// A notifier that forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls node tasks. Volume is a handful of
  // events per node.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }

  /// Create a notifier together with the receiving end of its channel.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExecutionEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self { sender }, receiver)
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
