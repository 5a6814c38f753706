use thiserror::Error;
use weft_compiler::CompileError;
use weft_config::Identifier;
use weft_registry::RegistryError;
use weft_runtime::RuntimeError;

/// Errors from creating or launching a launch plan.
#[derive(Debug, Error)]
pub enum LaunchError {
  /// Required workflow inputs left unbound after merging defaults and overrides.
  #[error("missing required inputs: {}", names.join(", "))]
  MissingInput { names: Vec<String> },

  #[error("type mismatch for input '{input}': expected {expected}, found {found}")]
  TypeMismatch {
    input: String,
    expected: String,
    found: String,
  },

  #[error("workflow declares no input '{input}'")]
  UnknownInput { input: String },

  #[error("input '{input}' is fixed by the launch plan")]
  FixedInputOverride { input: String },

  #[error(transparent)]
  Registry(#[from] RegistryError),

  #[error(transparent)]
  Runtime(#[from] RuntimeError),
}

/// Errors surfaced by the control plane.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
  #[error(transparent)]
  Registry(#[from] RegistryError),

  /// The workflow failed to compile.
  #[error("invalid workflow: {0}")]
  Validation(#[from] CompileError),

  #[error("task {task} names unknown handler '{handler}'")]
  UnknownHandler { task: Identifier, handler: String },

  /// The definition's interface differs from the one the handler declares.
  #[error("task {task} does not match the interface of handler '{handler}'")]
  InterfaceMismatch { task: Identifier, handler: String },

  #[error(transparent)]
  Launch(#[from] LaunchError),

  #[error(transparent)]
  Runtime(#[from] RuntimeError),
}
