use thiserror::Error;

/// Errors raised while building, converting, storing or encoding literals.
#[derive(Debug, Error)]
pub enum LiteralError {
  /// A literal of one type was bound where an incompatible type is expected.
  #[error("type mismatch: expected {expected}, found {found}")]
  TypeMismatch { expected: String, found: String },

  /// The runtime value does not conform to its own declared type.
  #[error("value of kind {found} does not conform to declared type {expected}")]
  NonConforming { expected: String, found: String },

  /// A slot was read before anything was written to it.
  #[error("slot is empty: {slot}")]
  SlotEmpty { slot: String },

  #[error("invalid dataframe: {message}")]
  InvalidFrame { message: String },

  /// NaN and infinities have no representation in the byte encoding.
  #[error("non-finite float cannot be encoded")]
  NonFiniteFloat,

  #[error("unsupported literal envelope version: {version}")]
  UnsupportedVersion { version: u32 },

  #[error("codec error: {0}")]
  Codec(#[from] serde_json::Error),
}
