use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::LiteralError;
use crate::frame::DataFrame;
use crate::schema::Schema;
use crate::types::LiteralType;

/// Named literals, as passed into and out of tasks and workflows.
pub type LiteralMap = BTreeMap<String, TypedLiteral>;

/// Runtime value of a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
  None,
  Integer(i64),
  Float(f64),
  String(String),
  Boolean(bool),
  List(Vec<Value>),
  Map(BTreeMap<String, Value>),
  Record(BTreeMap<String, Value>),
  Frame(DataFrame),
}

impl Value {
  pub fn kind(&self) -> &'static str {
    match self {
      Value::None => "none",
      Value::Integer(_) => "integer",
      Value::Float(_) => "float",
      Value::String(_) => "string",
      Value::Boolean(_) => "boolean",
      Value::List(_) => "list",
      Value::Map(_) => "map",
      Value::Record(_) => "record",
      Value::Frame(_) => "frame",
    }
  }

  pub fn as_frame(&self) -> Option<&DataFrame> {
    match self {
      Value::Frame(frame) => Some(frame),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  /// Structural conformance of this value to `ty`.
  fn conforms_to(&self, ty: &LiteralType) -> bool {
    match (self, ty) {
      (Value::None, LiteralType::Optional { .. }) => true,
      (value, LiteralType::Optional { inner }) => value.conforms_to(inner),
      (Value::Integer(_), LiteralType::Integer) => true,
      (Value::Float(_), LiteralType::Float) => true,
      (Value::String(_), LiteralType::String) => true,
      (Value::Boolean(_), LiteralType::Boolean) => true,
      (Value::List(items), LiteralType::List { element }) => {
        items.iter().all(|item| item.conforms_to(element))
      }
      (Value::Map(entries), LiteralType::Map { value }) => {
        entries.values().all(|item| item.conforms_to(value))
      }
      (Value::Record(entries), LiteralType::Record { fields }) => {
        entries.len() == fields.len()
          && fields
            .iter()
            .all(|(name, t)| entries.get(name).is_some_and(|v| v.conforms_to(t)))
      }
      (Value::Frame(frame), LiteralType::Dataframe { schema }) => {
        frame.validate().is_ok()
          && schema.fields.iter().all(|field| {
            frame
              .column(&field.name)
              .is_some_and(|c| c.dtype() == field.dtype)
          })
      }
      _ => false,
    }
  }

  /// Convert a value already known to be assignable into the shape of `target`.
  fn coerce(self, target: &LiteralType) -> Value {
    match (self, target) {
      (Value::None, _) => Value::None,
      (Value::Integer(i), LiteralType::Float) => Value::Float(i as f64),
      (value, LiteralType::Optional { inner }) => value.coerce(inner),
      (Value::List(items), LiteralType::List { element }) => {
        Value::List(items.into_iter().map(|v| v.coerce(element)).collect())
      }
      (Value::Map(entries), LiteralType::Map { value }) => Value::Map(
        entries
          .into_iter()
          .map(|(k, v)| (k, v.coerce(value)))
          .collect(),
      ),
      (Value::Record(entries), LiteralType::Record { fields }) => Value::Record(
        entries
          .into_iter()
          .map(|(k, v)| match fields.get(&k) {
            Some(t) => {
              let v = v.coerce(t);
              (k, v)
            }
            None => (k, v),
          })
          .collect(),
      ),
      (value, _) => value,
    }
  }
}

/// A value together with its declared type.
///
/// The value always conforms to the type: construction and deserialization both
/// check it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLiteral")]
pub struct TypedLiteral {
  #[serde(rename = "type")]
  ty: LiteralType,
  value: Value,
}

#[derive(Deserialize)]
struct RawLiteral {
  #[serde(rename = "type")]
  ty: LiteralType,
  value: Value,
}

impl TryFrom<RawLiteral> for TypedLiteral {
  type Error = LiteralError;

  fn try_from(raw: RawLiteral) -> Result<Self, Self::Error> {
    TypedLiteral::new(raw.ty, raw.value)
  }
}

impl TypedLiteral {
  pub fn new(ty: LiteralType, value: Value) -> Result<Self, LiteralError> {
    if !value.conforms_to(&ty) {
      return Err(LiteralError::NonConforming {
        expected: ty.to_string(),
        found: value.kind().to_string(),
      });
    }
    Ok(Self { ty, value })
  }

  pub fn integer(value: i64) -> Self {
    Self {
      ty: LiteralType::Integer,
      value: Value::Integer(value),
    }
  }

  pub fn float(value: f64) -> Self {
    Self {
      ty: LiteralType::Float,
      value: Value::Float(value),
    }
  }

  pub fn string(value: impl Into<String>) -> Self {
    Self {
      ty: LiteralType::String,
      value: Value::String(value.into()),
    }
  }

  pub fn boolean(value: bool) -> Self {
    Self {
      ty: LiteralType::Boolean,
      value: Value::Boolean(value),
    }
  }

  /// The empty value of `optional<inner>`.
  pub fn none(inner: LiteralType) -> Self {
    let ty = match inner {
      LiteralType::Optional { .. } => inner,
      other => LiteralType::optional(other),
    };
    Self {
      ty,
      value: Value::None,
    }
  }

  pub fn frame(schema: Schema, frame: DataFrame) -> Result<Self, LiteralError> {
    Self::new(LiteralType::dataframe(schema), Value::Frame(frame))
  }

  pub fn ty(&self) -> &LiteralType {
    &self.ty
  }

  pub fn value(&self) -> &Value {
    &self.value
  }

  pub fn into_value(self) -> Value {
    self.value
  }

  /// Re-type this literal for a sink declared as `target`.
  ///
  /// Fails with [`LiteralError::TypeMismatch`] unless the declared type is
  /// assignable to `target`.
  pub fn coerce_to(&self, target: &LiteralType) -> Result<TypedLiteral, LiteralError> {
    if self.ty == *target {
      return Ok(self.clone());
    }
    if !self.ty.is_assignable_to(target) {
      return Err(LiteralError::TypeMismatch {
        expected: target.to_string(),
        found: self.ty.to_string(),
      });
    }
    Ok(TypedLiteral {
      ty: target.clone(),
      value: self.value.clone().coerce(target),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::ColumnData;
  use crate::schema::Field;
  use crate::types::ColumnType;

  #[test]
  fn test_new_rejects_nonconforming_value() {
    let err = TypedLiteral::new(LiteralType::Integer, Value::String("x".into())).unwrap_err();
    assert!(matches!(err, LiteralError::NonConforming { .. }));

    let err = TypedLiteral::new(
      LiteralType::list(LiteralType::Integer),
      Value::List(vec![Value::Integer(1), Value::Float(2.0)]),
    )
    .unwrap_err();
    assert!(matches!(err, LiteralError::NonConforming { .. }));
  }

  #[test]
  fn test_deserialize_validates() {
    let bad = serde_json::json!({"type": {"type": "boolean"}, "value": {"integer": 1}});
    assert!(serde_json::from_value::<TypedLiteral>(bad).is_err());

    let good = serde_json::json!({"type": {"type": "float"}, "value": {"float": 12}});
    let literal: TypedLiteral = serde_json::from_value(good).unwrap();
    assert_eq!(literal, TypedLiteral::float(12.0));
  }

  #[test]
  fn test_coerce_widens_nested_integers() {
    let literal = TypedLiteral::new(
      LiteralType::map(LiteralType::Integer),
      Value::Map(BTreeMap::from([("a".to_string(), Value::Integer(3))])),
    )
    .unwrap();

    let target = LiteralType::optional(LiteralType::map(LiteralType::Float));
    let coerced = literal.coerce_to(&target).unwrap();
    assert_eq!(coerced.ty(), &target);
    assert_eq!(
      coerced.value(),
      &Value::Map(BTreeMap::from([("a".to_string(), Value::Float(3.0))]))
    );
  }

  #[test]
  fn test_coerce_rejects_narrowing() {
    let err = TypedLiteral::float(1.5)
      .coerce_to(&LiteralType::Integer)
      .unwrap_err();
    assert!(matches!(err, LiteralError::TypeMismatch { .. }));
  }

  #[test]
  fn test_frame_must_carry_schema_columns() {
    let schema = Schema::new("S").field(Field::new("pay", ColumnType::Float));
    let frame = DataFrame::new()
      .with_column("pay", ColumnData::Integer(vec![1, 2]))
      .unwrap();
    assert!(TypedLiteral::frame(schema.clone(), frame).is_err());

    let frame = DataFrame::new()
      .with_column("pay", ColumnData::Float(vec![1.0, 2.0]))
      .unwrap()
      .with_column("extra", ColumnData::Boolean(vec![true, true]))
      .unwrap();
    assert!(TypedLiteral::frame(schema, frame).is_ok());
  }

  #[test]
  fn test_none_does_not_double_wrap() {
    let a = TypedLiteral::none(LiteralType::String);
    let b = TypedLiteral::none(LiteralType::optional(LiteralType::String));
    assert_eq!(a, b);
  }
}
