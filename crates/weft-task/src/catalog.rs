use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use weft_config::{Identifier, TaskDef};
use weft_literal::{Interface, LiteralMap, LiteralType};

use crate::error::{CatalogError, TaskError};
use crate::task::{TaskContext, TaskFn, fn_task};

/// Declared signature of a task handler.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
  handler: String,
  interface: Interface,
}

impl TaskSpec {
  pub fn new(handler: impl Into<String>) -> Self {
    Self {
      handler: handler.into(),
      interface: Interface::new(),
    }
  }

  pub fn input(mut self, name: impl Into<String>, ty: LiteralType) -> Self {
    self.interface = self.interface.input(name, ty);
    self
  }

  pub fn output(mut self, name: impl Into<String>, ty: LiteralType) -> Self {
    self.interface = self.interface.output(name, ty);
    self
  }

  pub fn handler(&self) -> &str {
    &self.handler
  }

  pub fn interface(&self) -> &Interface {
    &self.interface
  }

  /// A registrable definition for this handler under `id`.
  pub fn task_def(&self, id: Identifier) -> TaskDef {
    TaskDef {
      id,
      handler: self.handler.clone(),
      interface: self.interface.clone(),
      retry: None,
      timeout_ms: None,
    }
  }
}

pub struct CatalogEntry {
  pub interface: Interface,
  pub task: Arc<dyn TaskFn>,
}

impl fmt::Debug for CatalogEntry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CatalogEntry")
      .field("interface", &self.interface)
      .finish_non_exhaustive()
  }
}

/// Side table from handler name to declared interface and invocation wrapper.
///
/// Built once, explicitly, and handed to the engine; it is never mutated after.
#[derive(Debug, Default)]
pub struct TaskCatalog {
  entries: HashMap<String, CatalogEntry>,
}

impl TaskCatalog {
  pub fn builder() -> TaskCatalogBuilder {
    TaskCatalogBuilder::default()
  }

  pub fn get(&self, handler: &str) -> Option<&CatalogEntry> {
    self.entries.get(handler)
  }

  /// Declared interfaces by handler, sorted by handler name.
  pub fn interfaces(&self) -> Vec<(&str, &Interface)> {
    let mut all: Vec<_> = self
      .entries
      .iter()
      .map(|(handler, entry)| (handler.as_str(), &entry.interface))
      .collect();
    all.sort_by_key(|(handler, _)| *handler);
    all
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

#[derive(Default)]
pub struct TaskCatalogBuilder {
  entries: HashMap<String, CatalogEntry>,
  duplicate: Option<String>,
}

impl TaskCatalogBuilder {
  pub fn register(mut self, spec: TaskSpec, task: impl TaskFn + 'static) -> Self {
    let TaskSpec { handler, interface } = spec;
    if self.entries.contains_key(&handler) {
      self.duplicate.get_or_insert(handler);
      return self;
    }
    self.entries.insert(
      handler,
      CatalogEntry {
        interface,
        task: Arc::new(task),
      },
    );
    self
  }

  /// Register an async closure as the handler for `spec`.
  pub fn register_fn<F, Fut>(self, spec: TaskSpec, func: F) -> Self
  where
    F: Fn(TaskContext, LiteralMap) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<LiteralMap, TaskError>> + Send + 'static,
  {
    self.register(spec, fn_task(func))
  }

  pub fn build(self) -> Result<TaskCatalog, CatalogError> {
    if let Some(handler) = self.duplicate {
      return Err(CatalogError::DuplicateHandler { handler });
    }
    Ok(TaskCatalog {
      entries: self.entries,
    })
  }
}
