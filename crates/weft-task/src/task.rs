use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use weft_literal::{LiteralMap, TypedLiteral};

use crate::error::TaskError;

/// Context provided to a task for one attempt.
#[derive(Debug, Clone)]
pub struct TaskContext {
  pub execution_id: String,
  pub node_id: String,
  /// 1-based attempt number.
  pub attempt: u32,
  /// Cancelled when the execution is aborted. Tasks may observe it to stop early;
  /// nothing forces them to.
  pub cancel: CancellationToken,
}

/// Invocation wrapper for a task.
#[async_trait]
pub trait TaskFn: Send + Sync {
  async fn call(&self, ctx: TaskContext, inputs: LiteralMap) -> Result<LiteralMap, TaskError>;
}

/// Adapts an async closure into a [`TaskFn`].
pub struct FnTask<F> {
  func: F,
}

pub fn fn_task<F, Fut>(func: F) -> FnTask<F>
where
  F: Fn(TaskContext, LiteralMap) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<LiteralMap, TaskError>> + Send + 'static,
{
  FnTask { func }
}

#[async_trait]
impl<F, Fut> TaskFn for FnTask<F>
where
  F: Fn(TaskContext, LiteralMap) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<LiteralMap, TaskError>> + Send + 'static,
{
  async fn call(&self, ctx: TaskContext, inputs: LiteralMap) -> Result<LiteralMap, TaskError> {
    (self.func)(ctx, inputs).await
  }
}

/// Fetch a required input by name.
pub fn input<'a>(inputs: &'a LiteralMap, name: &str) -> Result<&'a TypedLiteral, TaskError> {
  inputs.get(name).ok_or_else(|| TaskError::MissingInput {
    name: name.to_string(),
  })
}
