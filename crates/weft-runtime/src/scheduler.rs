//! Dependency-driven node scheduling for one execution.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinError, JoinSet};
use tracing::{error, info, instrument, warn};
use weft_config::RetryPolicy;
use weft_literal::LiteralMap;
use weft_task::{TaskCatalog, TaskContext, TaskError};
use weft_workflow::Node;

use crate::error::RuntimeError;
use crate::events::ExecutionEvent;
use crate::execution::Execution;
use crate::state::{ExecutionPhase, NodeFailure, NodeState};

/// How a node task ended, as seen by the scheduler.
enum Outcome {
  Done,
  Failed,
  /// Finished after an abort; nothing was recorded.
  Discarded,
  /// Never ran: the execution was aborted first.
  Cancelled,
}

pub(crate) struct Scheduler {
  execution: Arc<Execution>,
  catalog: Arc<TaskCatalog>,
  default_retry: RetryPolicy,
  permits: Option<Arc<Semaphore>>,
}

impl Scheduler {
  pub(crate) fn new(
    execution: Arc<Execution>,
    catalog: Arc<TaskCatalog>,
    default_retry: RetryPolicy,
    permits: Option<Arc<Semaphore>>,
  ) -> Self {
    Self {
      execution,
      catalog,
      default_retry,
      permits,
    }
  }

  /// Drive the execution until every node is terminal or it is aborted.
  #[instrument(
    name = "execution_run",
    skip(self),
    fields(
      execution_id = %self.execution.id,
      workflow = %self.execution.workflow.id,
    )
  )]
  pub(crate) async fn run(self: Arc<Self>) {
    let exec = &self.execution;
    if !exec.start() {
      return;
    }

    info!(
      execution_id = %exec.id,
      workflow = %exec.workflow.id,
      nodes = exec.workflow.nodes.len(),
      "execution_started"
    );
    exec.notify(ExecutionEvent::ExecutionStarted {
      execution_id: exec.id.to_string(),
      workflow: exec.workflow.id.to_string(),
    });

    let graph = exec.workflow.graph();
    let mut remaining: Vec<usize> = (0..graph.len()).map(|i| graph.upstream(i).len()).collect();
    let mut running = JoinSet::new();
    let mut tasks = HashMap::new();

    for i in graph.entry_points() {
      self.schedule(&mut running, &mut tasks, i);
    }

    loop {
      let joined = tokio::select! {
        biased;
        _ = exec.cancel.cancelled() => break,
        joined = running.join_next_with_id() => joined,
      };
      let Some(joined) = joined else {
        break;
      };

      let (i, outcome) = match joined {
        Ok((id, result)) => {
          tasks.remove(&id);
          result
        }
        Err(e) => {
          let Some(i) = tasks.remove(&e.id()) else {
            continue;
          };
          (i, self.fail_lost_node(i, e))
        }
      };

      match outcome {
        Outcome::Done => {
          for &d in graph.downstream(i) {
            remaining[d] -= 1;
            if remaining[d] == 0 {
              self.schedule(&mut running, &mut tasks, d);
            }
          }
        }
        Outcome::Failed => self.skip_dependents(i),
        Outcome::Discarded | Outcome::Cancelled => {}
      }
    }

    if exec.cancel.is_cancelled() {
      // Let nodes already running finish; their results are discarded.
      while running.join_next().await.is_some() {}
      return;
    }

    self.finalize();
  }

  fn schedule(
    self: &Arc<Self>,
    running: &mut JoinSet<(usize, Outcome)>,
    tasks: &mut HashMap<task::Id, usize>,
    i: usize,
  ) {
    if !self
      .execution
      .nodes
      .transition(i, NodeState::Waiting, NodeState::Ready)
    {
      return;
    }
    let scheduler = Arc::clone(self);
    let handle = running.spawn(async move {
      let outcome = scheduler.run_node(i).await;
      (i, outcome)
    });
    tasks.insert(handle.id(), i);
  }

  /// Record a node task that ended without reporting an outcome: it panicked
  /// outside the task call, or was cancelled with the runtime.
  fn fail_lost_node(&self, i: usize, e: JoinError) -> Outcome {
    let exec = &self.execution;
    let node = &exec.workflow.nodes[i];

    let state = exec.nodes.state(i);
    match state {
      // Outputs are written before the node is reported, so they are usable.
      NodeState::Done => return Outcome::Done,
      NodeState::Ready | NodeState::Running => {}
      _ => return Outcome::Discarded,
    }

    let cause = if e.is_panic() {
      TaskError::Panicked {
        message: panic_message(&*e.into_panic()),
      }
    } else {
      TaskError::permanent(format!("node task cancelled: {e}"))
    };
    let failure = NodeFailure::new(cause, exec.nodes.attempts(i), false);
    let message = failure.message.clone();
    exec.nodes.set_failure(i, failure);
    if !exec.nodes.transition(i, state, NodeState::Failed) {
      return Outcome::Discarded;
    }

    error!(
      execution_id = %exec.id,
      node_id = %node.node_id,
      error = %message,
      "node_task_lost"
    );
    exec.notify(ExecutionEvent::NodeFailed {
      execution_id: exec.id.to_string(),
      node_id: node.node_id.clone(),
      error: message,
    });
    Outcome::Failed
  }

  fn skip_dependents(&self, failed: usize) {
    let exec = &self.execution;
    for d in exec.workflow.graph().transitive_downstream(failed) {
      if exec.nodes.transition(d, NodeState::Waiting, NodeState::Skipped) {
        let node_id = &exec.workflow.nodes[d].node_id;
        info!(execution_id = %exec.id, node_id = %node_id, "node_skipped");
        exec.notify(ExecutionEvent::NodeSkipped {
          execution_id: exec.id.to_string(),
          node_id: node_id.clone(),
        });
      }
    }
  }

  fn finalize(&self) {
    let exec = &self.execution;
    let all_done = (0..exec.nodes.len()).all(|i| exec.nodes.state(i) == NodeState::Done);

    let result = if all_done {
      exec.resolve_outputs()
    } else {
      Err(
        exec
          .first_failure()
          .unwrap_or_else(|| RuntimeError::NotFinished {
            execution_id: exec.id.clone(),
          }),
      )
    };

    match result {
      Ok(outputs) => {
        if exec.finish(ExecutionPhase::Succeeded, Some(outputs), None) {
          info!(execution_id = %exec.id, "execution_succeeded");
          exec.notify(ExecutionEvent::ExecutionSucceeded {
            execution_id: exec.id.to_string(),
          });
        }
      }
      Err(e) => {
        let message = e.to_string();
        if exec.finish(ExecutionPhase::Failed, None, Some(e)) {
          error!(execution_id = %exec.id, error = %message, "execution_failed");
          exec.notify(ExecutionEvent::ExecutionFailed {
            execution_id: exec.id.to_string(),
            error: message,
          });
        }
      }
    }
  }

  #[instrument(
    name = "node_run",
    skip(self),
    fields(
      execution_id = %self.execution.id,
      node_id = %self.execution.workflow.nodes[i].node_id,
    )
  )]
  async fn run_node(&self, i: usize) -> Outcome {
    let exec = &self.execution;
    let node = &exec.workflow.nodes[i];

    // Waiting for a permit keeps the node READY.
    let _permit = match &self.permits {
      Some(permits) => {
        let acquired = tokio::select! {
          biased;
          _ = exec.cancel.cancelled() => return Outcome::Cancelled,
          permit = Arc::clone(permits).acquire_owned() => permit,
        };
        match acquired {
          Ok(permit) => Some(permit),
          // The semaphore is never closed.
          Err(_) => return Outcome::Cancelled,
        }
      }
      None => None,
    };

    if !exec
      .nodes
      .transition(i, NodeState::Ready, NodeState::Running)
    {
      return Outcome::Cancelled;
    }

    info!(execution_id = %exec.id, node_id = %node.node_id, task = %node.task, "node_started");
    exec.notify(ExecutionEvent::NodeStarted {
      execution_id: exec.id.to_string(),
      node_id: node.node_id.clone(),
    });

    let policy = node.retry.unwrap_or(self.default_retry);
    let (result, attempts) = self.attempt_loop(i, node, policy).await;

    match result {
      Ok(outputs) => {
        if !exec.nodes.transition(i, NodeState::Running, NodeState::Done) {
          return self.discard(node);
        }
        // Written before the scheduler sees Done, so consumers always find them.
        exec.write_outputs(node, outputs);
        info!(execution_id = %exec.id, node_id = %node.node_id, attempts, "node_completed");
        exec.notify(ExecutionEvent::NodeCompleted {
          execution_id: exec.id.to_string(),
          node_id: node.node_id.clone(),
        });
        Outcome::Done
      }
      Err(e) => {
        // Record the failure before the state flips, so a snapshot that sees
        // FAILED also sees why.
        let exhausted = e.is_transient() && attempts >= policy.attempts();
        let failure = NodeFailure::new(e, attempts, exhausted);
        let message = failure.message.clone();
        if exec.nodes.state(i) != NodeState::Running {
          return self.discard(node);
        }
        exec.nodes.set_failure(i, failure);
        if !exec
          .nodes
          .transition(i, NodeState::Running, NodeState::Failed)
        {
          return self.discard(node);
        }
        error!(
          execution_id = %exec.id,
          node_id = %node.node_id,
          attempts,
          error = %message,
          "node_failed"
        );
        exec.notify(ExecutionEvent::NodeFailed {
          execution_id: exec.id.to_string(),
          node_id: node.node_id.clone(),
          error: message,
        });
        Outcome::Failed
      }
    }
  }

  /// Invoke the task until it succeeds, fails permanently or runs out of attempts.
  /// Returns the final result with the number of attempts made.
  async fn attempt_loop(
    &self,
    i: usize,
    node: &Node,
    policy: RetryPolicy,
  ) -> (Result<LiteralMap, TaskError>, u32) {
    let exec = &self.execution;

    let Some(entry) = self.catalog.get(&node.handler) else {
      let error = TaskError::permanent(format!("no handler registered as '{}'", node.handler));
      return (Err(error), 0);
    };

    let inputs = match exec.read_inputs(node) {
      Ok(inputs) => inputs,
      Err(e) => return (Err(TaskError::from(e)), 0),
    };

    let max_attempts = policy.attempts();
    let mut attempt = 1;
    loop {
      exec.nodes.set_attempts(i, attempt);

      let ctx = TaskContext {
        execution_id: exec.id.to_string(),
        node_id: node.node_id.clone(),
        attempt,
        cancel: exec.cancel.child_token(),
      };
      let call = AssertUnwindSafe(entry.task.call(ctx, inputs.clone())).catch_unwind();

      let result = match node.timeout_ms {
        Some(timeout_ms) => {
          match tokio::time::timeout(Duration::from_millis(timeout_ms), call).await {
            Ok(result) => result,
            Err(_) => Ok(Err(TaskError::Timeout { timeout_ms })),
          }
        }
        None => call.await,
      };

      let result = match result {
        Ok(result) => result.and_then(|outputs| check_outputs(node, outputs)),
        Err(panic) => Err(TaskError::Panicked {
          message: panic_message(panic.as_ref()),
        }),
      };

      let error = match result {
        Ok(outputs) => return (Ok(outputs), attempt),
        Err(e) => e,
      };

      if !error.is_transient() || attempt >= max_attempts || exec.cancel.is_cancelled() {
        return (Err(error), attempt);
      }

      let delay = policy.delay(attempt);
      warn!(
        execution_id = %exec.id,
        node_id = %node.node_id,
        attempt,
        max_attempts,
        delay_ms = delay.as_millis() as u64,
        error = %error,
        "node_retrying"
      );
      exec.notify(ExecutionEvent::NodeRetrying {
        execution_id: exec.id.to_string(),
        node_id: node.node_id.clone(),
        attempt,
        error: error.to_string(),
      });

      tokio::select! {
        biased;
        _ = exec.cancel.cancelled() => return (Err(error), attempt),
        _ = tokio::time::sleep(delay) => {}
      }
      attempt += 1;
    }
  }

  fn discard(&self, node: &Node) -> Outcome {
    let exec = &self.execution;
    info!(execution_id = %exec.id, node_id = %node.node_id, "node_result_discarded");
    exec.notify(ExecutionEvent::NodeResultDiscarded {
      execution_id: exec.id.to_string(),
      node_id: node.node_id.clone(),
    });
    Outcome::Discarded
  }
}

/// Check returned outputs against the node's declared interface, converting each
/// value to its declared type.
fn check_outputs(node: &Node, mut outputs: LiteralMap) -> Result<LiteralMap, TaskError> {
  if let Some(extra) = outputs
    .keys()
    .find(|name| !node.interface.outputs.contains_key(*name))
  {
    return Err(TaskError::permanent(format!("undeclared output '{extra}'")));
  }

  let mut checked = LiteralMap::new();
  for (name, ty) in &node.interface.outputs {
    let literal = outputs
      .remove(name)
      .ok_or_else(|| TaskError::permanent(format!("missing output '{name}'")))?;
    let literal = literal
      .coerce_to(ty)
      .map_err(|e| TaskError::permanent(format!("output '{name}': {e}")))?;
    checked.insert(name.clone(), literal);
  }
  Ok(checked)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
  if let Some(message) = panic.downcast_ref::<&str>() {
    (*message).to_string()
  } else if let Some(message) = panic.downcast_ref::<String>() {
    message.clone()
  } else {
    "task panicked".to_string()
  }
}
