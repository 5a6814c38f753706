use thiserror::Error;
use weft_config::Identifier;
use weft_registry::RegistryError;

/// Errors that reject a workflow definition at registration time.
///
/// A `site` names where a binding lives: `node.input` for node inputs,
/// `outputs.name` for workflow outputs.
#[derive(Debug, Error)]
pub enum CompileError {
  #[error("duplicate node id: {node_id}")]
  DuplicateNodeId { node_id: String },

  #[error("node '{node_id}' references unregistered task {task}")]
  TaskNotFound { node_id: String, task: Identifier },

  /// A binding was given for an input the task does not declare.
  #[error("node '{node_id}' binds unknown input '{input}'")]
  UnknownInput { node_id: String, input: String },

  /// A declared, non-optional input has no source.
  #[error("input '{input}' of node '{node_id}' is not bound")]
  UnboundInput { node_id: String, input: String },

  #[error("{site} references unknown {reference}")]
  UnknownReference { site: String, reference: String },

  #[error("type mismatch at {site}: expected {expected}, found {found}")]
  TypeMismatch {
    site: String,
    expected: String,
    found: String,
  },

  #[error("cycle detected in workflow graph at node '{node_id}'")]
  CyclicGraph { node_id: String },

  #[error("registry error: {0}")]
  Registry(#[from] RegistryError),

  #[error("failed to encode definition for digest: {0}")]
  Encoding(#[from] serde_json::Error),
}
