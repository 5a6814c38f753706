use thiserror::Error;
use weft_config::Identifier;

#[derive(Debug, Error)]
pub enum RegistryError {
  /// The exact identifier tuple is already registered.
  #[error("duplicate identifier: {id}")]
  DuplicateIdentifier { id: Identifier },

  #[error("not found: {id}")]
  NotFound { id: Identifier },

  #[error("invalid identifier {id}: {part} must not be empty")]
  InvalidIdentifier { id: Identifier, part: &'static str },

  #[error("invalid page token: {token}")]
  InvalidToken { token: String },

  #[error("page limit must be greater than zero")]
  InvalidLimit,
}
