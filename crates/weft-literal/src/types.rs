use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::Schema;

/// Element type of a dataframe column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
  Integer,
  Float,
  String,
  Boolean,
}

impl fmt::Display for ColumnType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ColumnType::Integer => "integer",
      ColumnType::Float => "float",
      ColumnType::String => "string",
      ColumnType::Boolean => "boolean",
    };
    f.write_str(name)
  }
}

/// Declared type of a literal.
///
/// Serialized with an internal `type` tag, e.g.
/// `{"type": "list", "element": {"type": "float"}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiteralType {
  Integer,
  Float,
  String,
  Boolean,
  Optional { inner: Box<LiteralType> },
  List { element: Box<LiteralType> },
  /// String-keyed map with homogeneous values.
  Map { value: Box<LiteralType> },
  Record { fields: BTreeMap<String, LiteralType> },
  Dataframe { schema: Schema },
}

impl LiteralType {
  pub fn optional(inner: LiteralType) -> Self {
    LiteralType::Optional {
      inner: Box::new(inner),
    }
  }

  pub fn list(element: LiteralType) -> Self {
    LiteralType::List {
      element: Box::new(element),
    }
  }

  pub fn map(value: LiteralType) -> Self {
    LiteralType::Map {
      value: Box::new(value),
    }
  }

  pub fn record<K, I>(fields: I) -> Self
  where
    K: Into<String>,
    I: IntoIterator<Item = (K, LiteralType)>,
  {
    LiteralType::Record {
      fields: fields.into_iter().map(|(k, t)| (k.into(), t)).collect(),
    }
  }

  pub fn dataframe(schema: Schema) -> Self {
    LiteralType::Dataframe { schema }
  }

  /// Inputs of optional type may be left unbound.
  pub fn is_optional(&self) -> bool {
    matches!(self, LiteralType::Optional { .. })
  }

  /// Whether a literal of this type may flow into a sink declared as `target`.
  ///
  /// Accepts exact matches, `integer` to `float` widening, required to optional
  /// wrapping, element-wise compatible collections and records, and dataframes
  /// whose schema provides every target column with the same column type.
  pub fn is_assignable_to(&self, target: &LiteralType) -> bool {
    use LiteralType::*;

    if self == target {
      return true;
    }

    match (self, target) {
      (Integer, Float) => true,
      (Optional { inner: a }, Optional { inner: b }) => a.is_assignable_to(b),
      (Optional { .. }, _) => false,
      (source, Optional { inner }) => source.is_assignable_to(inner),
      (List { element: a }, List { element: b }) => a.is_assignable_to(b),
      (Map { value: a }, Map { value: b }) => a.is_assignable_to(b),
      (Record { fields: a }, Record { fields: b }) => {
        a.len() == b.len()
          && b
            .iter()
            .all(|(name, t)| a.get(name).is_some_and(|s| s.is_assignable_to(t)))
      }
      (Dataframe { schema: a }, Dataframe { schema: b }) => b.fields.iter().all(|field| {
        a.field_named(&field.name)
          .is_some_and(|source| source.dtype == field.dtype)
      }),
      _ => false,
    }
  }
}

impl fmt::Display for LiteralType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LiteralType::Integer => f.write_str("integer"),
      LiteralType::Float => f.write_str("float"),
      LiteralType::String => f.write_str("string"),
      LiteralType::Boolean => f.write_str("boolean"),
      LiteralType::Optional { inner } => write!(f, "optional<{}>", inner),
      LiteralType::List { element } => write!(f, "list<{}>", element),
      LiteralType::Map { value } => write!(f, "map<{}>", value),
      LiteralType::Record { fields } => {
        f.write_str("record{")?;
        for (i, (name, ty)) in fields.iter().enumerate() {
          if i > 0 {
            f.write_str(", ")?;
          }
          write!(f, "{}: {}", name, ty)?;
        }
        f.write_str("}")
      }
      LiteralType::Dataframe { schema } => write!(f, "dataframe<{}>", schema.name),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::schema::Field;

  #[test]
  fn test_integer_widens_to_float() {
    assert!(LiteralType::Integer.is_assignable_to(&LiteralType::Float));
    assert!(!LiteralType::Float.is_assignable_to(&LiteralType::Integer));
  }

  #[test]
  fn test_required_wraps_into_optional() {
    let target = LiteralType::optional(LiteralType::Float);
    assert!(LiteralType::Integer.is_assignable_to(&target));
    assert!(!target.is_assignable_to(&LiteralType::Float));
  }

  #[test]
  fn test_collections_are_element_wise() {
    let ints = LiteralType::list(LiteralType::Integer);
    let floats = LiteralType::list(LiteralType::Float);
    assert!(ints.is_assignable_to(&floats));
    assert!(!floats.is_assignable_to(&ints));
    assert!(!ints.is_assignable_to(&LiteralType::map(LiteralType::Integer)));
  }

  #[test]
  fn test_record_requires_same_fields() {
    let a = LiteralType::record([("x", LiteralType::Integer)]);
    let b = LiteralType::record([("x", LiteralType::Float)]);
    let c = LiteralType::record([("x", LiteralType::Float), ("y", LiteralType::String)]);
    assert!(a.is_assignable_to(&b));
    assert!(!a.is_assignable_to(&c));
  }

  #[test]
  fn test_dataframe_subset_of_columns() {
    let narrow = Schema::new("In").field(Field::new("hours", ColumnType::Float));
    let wide = narrow
      .extend("Out")
      .field(Field::new("total", ColumnType::Float));

    let narrow = LiteralType::dataframe(narrow);
    let wide = LiteralType::dataframe(wide);
    assert!(wide.is_assignable_to(&narrow));
    assert!(!narrow.is_assignable_to(&wide));
  }

  #[test]
  fn test_display() {
    let ty = LiteralType::optional(LiteralType::map(LiteralType::list(LiteralType::Boolean)));
    assert_eq!(ty.to_string(), "optional<map<list<boolean>>>");

    let schema = Schema::new("InSchema");
    assert_eq!(
      LiteralType::dataframe(schema).to_string(),
      "dataframe<InSchema>"
    );
  }

  #[test]
  fn test_serde_shape() {
    let ty = LiteralType::list(LiteralType::Float);
    let json = serde_json::to_value(&ty).unwrap();
    assert_eq!(
      json,
      serde_json::json!({"type": "list", "element": {"type": "float"}})
    );
    let back: LiteralType = serde_json::from_value(json).unwrap();
    assert_eq!(back, ty);
  }
}
