use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LiteralError;
use crate::literal::TypedLiteral;

/// Address of a slot in a [`LiteralStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotKey {
  /// A workflow-level input.
  Input { name: String },
  /// A named output of a node.
  Output { node_id: String, output: String },
}

impl SlotKey {
  pub fn input(name: impl Into<String>) -> Self {
    SlotKey::Input { name: name.into() }
  }

  pub fn output(node_id: impl Into<String>, output: impl Into<String>) -> Self {
    SlotKey::Output {
      node_id: node_id.into(),
      output: output.into(),
    }
  }
}

impl fmt::Display for SlotKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SlotKey::Input { name } => write!(f, "inputs.{}", name),
      SlotKey::Output { node_id, output } => write!(f, "{}.{}", node_id, output),
    }
  }
}

/// Mapping from slot keys to literals.
///
/// A plain mutable map: `put` overwrites. Callers that need write-once slots
/// enforce it themselves.
#[derive(Debug, Clone, Default)]
pub struct LiteralStore {
  slots: HashMap<SlotKey, TypedLiteral>,
}

impl LiteralStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn put(&mut self, key: SlotKey, literal: TypedLiteral) {
    self.slots.insert(key, literal);
  }

  pub fn get(&self, key: &SlotKey) -> Result<&TypedLiteral, LiteralError> {
    self.slots.get(key).ok_or_else(|| LiteralError::SlotEmpty {
      slot: key.to_string(),
    })
  }

  pub fn contains(&self, key: &SlotKey) -> bool {
    self.slots.contains_key(key)
  }

  pub fn len(&self) -> usize {
    self.slots.len()
  }

  pub fn is_empty(&self) -> bool {
    self.slots.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&SlotKey, &TypedLiteral)> {
    self.slots.iter()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_get_empty_slot() {
    let store = LiteralStore::new();
    let err = store.get(&SlotKey::output("a", "out")).unwrap_err();
    match err {
      LiteralError::SlotEmpty { slot } => assert_eq!(slot, "a.out"),
      other => panic!("expected SlotEmpty, got {other:?}"),
    }
  }

  #[test]
  fn test_put_overwrites() {
    let mut store = LiteralStore::new();
    let key = SlotKey::input("x");
    store.put(key.clone(), TypedLiteral::integer(1));
    store.put(key.clone(), TypedLiteral::integer(2));

    assert_eq!(store.len(), 1);
    assert_eq!(store.get(&key).unwrap(), &TypedLiteral::integer(2));
  }
}
