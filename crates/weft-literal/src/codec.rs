//! Byte encoding for literals.
//!
//! Literals are written as a small JSON envelope, `{"version": 1, "literal": {...}}`,
//! carrying both the declared type and the value so that decoding restores the exact
//! literal. Floats are written with round-trip precision; NaN and infinities are
//! rejected up front since JSON cannot represent them.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::LiteralError;
use crate::frame::ColumnData;
use crate::literal::{TypedLiteral, Value};
use crate::schema::Constraint;
use crate::types::LiteralType;

pub const ENVELOPE_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
  version: u32,
  literal: &'a TypedLiteral,
}

#[derive(Deserialize)]
struct Envelope {
  version: u32,
  literal: serde_json::Value,
}

pub fn encode(literal: &TypedLiteral) -> Result<Bytes, LiteralError> {
  ensure_finite_bounds(literal.ty())?;
  ensure_finite(literal.value())?;
  let bytes = serde_json::to_vec(&EnvelopeRef {
    version: ENVELOPE_VERSION,
    literal,
  })?;
  Ok(Bytes::from(bytes))
}

pub fn decode(bytes: &[u8]) -> Result<TypedLiteral, LiteralError> {
  let envelope: Envelope = serde_json::from_slice(bytes)?;
  if envelope.version != ENVELOPE_VERSION {
    return Err(LiteralError::UnsupportedVersion {
      version: envelope.version,
    });
  }
  Ok(serde_json::from_value(envelope.literal)?)
}

fn ensure_finite(value: &Value) -> Result<(), LiteralError> {
  let finite = match value {
    Value::Float(f) => f.is_finite(),
    Value::List(items) => return items.iter().try_for_each(ensure_finite),
    Value::Map(entries) | Value::Record(entries) => {
      return entries.values().try_for_each(ensure_finite);
    }
    Value::Frame(frame) => frame.columns().iter().all(|s| match &s.data {
      ColumnData::Float(values) => values.iter().all(|f| f.is_finite()),
      _ => true,
    }),
    _ => true,
  };

  if finite {
    Ok(())
  } else {
    Err(LiteralError::NonFiniteFloat)
  }
}

/// Schema constraint bounds travel with the type and must be finite as well.
fn ensure_finite_bounds(ty: &LiteralType) -> Result<(), LiteralError> {
  match ty {
    LiteralType::Optional { inner } => ensure_finite_bounds(inner),
    LiteralType::List { element } => ensure_finite_bounds(element),
    LiteralType::Map { value } => ensure_finite_bounds(value),
    LiteralType::Record { fields } => fields.values().try_for_each(ensure_finite_bounds),
    LiteralType::Dataframe { schema } => {
      let finite = schema
        .fields
        .iter()
        .flat_map(|field| &field.constraints)
        .all(|constraint| match constraint {
          Constraint::Ge(b) | Constraint::Gt(b) | Constraint::Le(b) | Constraint::Lt(b) => {
            b.is_finite()
          }
          Constraint::Unique => true,
        });
      if finite {
        Ok(())
      } else {
        Err(LiteralError::NonFiniteFloat)
      }
    }
    _ => Ok(()),
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use super::*;
  use crate::frame::DataFrame;
  use crate::schema::{Field, Schema};
  use crate::types::{ColumnType, LiteralType};

  fn assert_round_trip(literal: TypedLiteral) {
    let bytes = encode(&literal).unwrap();
    let decoded = decode(&bytes).unwrap();
    assert_eq!(decoded.ty(), literal.ty());
    assert_eq!(decoded, literal);
  }

  #[test]
  fn test_round_trip_preserves_type_and_value() {
    assert_round_trip(TypedLiteral::float(0.1 + 0.2));
    assert_round_trip(TypedLiteral::integer(i64::MIN));
    assert_round_trip(TypedLiteral::none(LiteralType::Integer));

    let record = TypedLiteral::new(
      LiteralType::record([
        ("tags", LiteralType::list(LiteralType::String)),
        ("weight", LiteralType::optional(LiteralType::Float)),
      ]),
      Value::Record(BTreeMap::from([
        (
          "tags".to_string(),
          Value::List(vec![Value::String("a".into())]),
        ),
        ("weight".to_string(), Value::Float(-0.5)),
      ])),
    )
    .unwrap();
    assert_round_trip(record);
  }

  #[test]
  fn test_round_trip_dataframe() {
    let schema = Schema::new("InSchema")
      .field(Field::new("hourly_pay", ColumnType::Float).ge(7.0))
      .field(Field::new("hours_worked", ColumnType::Float).ge(10.0));
    let frame = DataFrame::new()
      .with_column("hourly_pay", ColumnData::Float(vec![12.0, 13.5, 10.1]))
      .unwrap()
      .with_column("hours_worked", ColumnData::Float(vec![30.5, 40.0, 41.75]))
      .unwrap();

    assert_round_trip(TypedLiteral::frame(schema, frame).unwrap());
  }

  #[test]
  fn test_encode_rejects_non_finite() {
    let err = encode(&TypedLiteral::float(f64::NAN)).unwrap_err();
    assert!(matches!(err, LiteralError::NonFiniteFloat));

    let list = TypedLiteral::new(
      LiteralType::list(LiteralType::Float),
      Value::List(vec![Value::Float(1.0), Value::Float(f64::INFINITY)]),
    )
    .unwrap();
    assert!(matches!(
      encode(&list).unwrap_err(),
      LiteralError::NonFiniteFloat
    ));
  }

  #[test]
  fn test_encode_rejects_non_finite_schema_bound() {
    let schema = Schema::new("Capped").field(Field::new("x", ColumnType::Float).le(f64::INFINITY));
    let frame = DataFrame::new()
      .with_column("x", ColumnData::Float(vec![1.0]))
      .unwrap();
    let literal = TypedLiteral::frame(schema, frame).unwrap();
    assert!(matches!(
      encode(&literal).unwrap_err(),
      LiteralError::NonFiniteFloat
    ));

    let nested = Schema::new("Floor").field(Field::new("x", ColumnType::Float).gt(f64::NAN));
    let empty = TypedLiteral::none(LiteralType::optional(LiteralType::dataframe(nested)));
    assert!(matches!(
      encode(&empty).unwrap_err(),
      LiteralError::NonFiniteFloat
    ));
  }

  #[test]
  fn test_decode_rejects_unknown_version() {
    let bytes = br#"{"version": 7, "literal": {"type": {"type": "integer"}, "value": {"integer": 1}}}"#;
    let err = decode(bytes).unwrap_err();
    assert!(matches!(err, LiteralError::UnsupportedVersion { version: 7 }));
  }

  #[test]
  fn test_decode_rejects_nonconforming_payload() {
    let bytes = br#"{"version": 1, "literal": {"type": {"type": "string"}, "value": {"integer": 1}}}"#;
    assert!(matches!(decode(bytes).unwrap_err(), LiteralError::Codec(_)));
  }
}
