//! Plain JSON conversion against a declared type.
//!
//! Callers outside the engine (command line input, fixtures) usually have untyped
//! JSON. [`from_json`] reads such a document guided by the expected [`LiteralType`]:
//!
//! ```json
//! {
//!   "id": "qwerty",
//!   "hours": { "hourly_pay": [12.0, 13.5], "hours_worked": [30.5, 40.0] }
//! }
//! ```
//!
//! - scalars map to the matching scalar type, integers are accepted for `float`
//! - `null` is accepted for optional types
//! - a dataframe is an object of column name to array; column types come from the
//!   schema, extra columns are inferred from their values

use std::collections::BTreeMap;

use serde_json::Value as Json;

use crate::error::LiteralError;
use crate::frame::{ColumnData, DataFrame};
use crate::literal::{TypedLiteral, Value};
use crate::schema::Schema;
use crate::types::{ColumnType, LiteralType};

/// Read a plain JSON document as a literal of type `ty`.
pub fn from_json(ty: &LiteralType, json: Json) -> Result<TypedLiteral, LiteralError> {
  let value = value_from_json(ty, json)?;
  TypedLiteral::new(ty.clone(), value)
}

/// Render a literal as plain JSON, dropping its type.
pub fn to_json(literal: &TypedLiteral) -> Json {
  value_to_json(literal.value())
}

fn value_from_json(ty: &LiteralType, json: Json) -> Result<Value, LiteralError> {
  match (ty, json) {
    (LiteralType::Optional { .. }, Json::Null) => Ok(Value::None),
    (LiteralType::Optional { inner }, json) => value_from_json(inner, json),
    (LiteralType::Integer, Json::Number(n)) => n
      .as_i64()
      .map(Value::Integer)
      .ok_or_else(|| mismatch(ty, "non-integer number")),
    (LiteralType::Float, Json::Number(n)) => n
      .as_f64()
      .map(Value::Float)
      .ok_or_else(|| mismatch(ty, "number")),
    (LiteralType::String, Json::String(s)) => Ok(Value::String(s)),
    (LiteralType::Boolean, Json::Bool(b)) => Ok(Value::Boolean(b)),
    (LiteralType::List { element }, Json::Array(items)) => items
      .into_iter()
      .map(|item| value_from_json(element, item))
      .collect::<Result<Vec<_>, _>>()
      .map(Value::List),
    (LiteralType::Map { value }, Json::Object(entries)) => entries
      .into_iter()
      .map(|(k, v)| Ok((k, value_from_json(value, v)?)))
      .collect::<Result<BTreeMap<_, _>, LiteralError>>()
      .map(Value::Map),
    (LiteralType::Record { fields }, Json::Object(mut entries)) => {
      let mut record = BTreeMap::new();
      for (name, field_ty) in fields {
        let raw = entries.remove(name).unwrap_or(Json::Null);
        record.insert(name.clone(), value_from_json(field_ty, raw)?);
      }
      if let Some(extra) = entries.keys().next() {
        return Err(mismatch(ty, &format!("record with unknown field '{}'", extra)));
      }
      Ok(Value::Record(record))
    }
    (LiteralType::Dataframe { schema }, Json::Object(entries)) => {
      frame_from_json(schema, entries).map(Value::Frame)
    }
    (ty, other) => Err(mismatch(ty, json_kind(&other))),
  }
}

fn frame_from_json(
  schema: &Schema,
  mut entries: serde_json::Map<String, Json>,
) -> Result<DataFrame, LiteralError> {
  let mut frame = DataFrame::new();

  for field in &schema.fields {
    let Some(raw) = entries.remove(&field.name) else {
      return Err(LiteralError::InvalidFrame {
        message: format!("missing column '{}' required by {}", field.name, schema.name),
      });
    };
    let data = column_from_json(&field.name, field.dtype, raw)?;
    frame.assign(field.name.clone(), data)?;
  }

  for (name, raw) in entries {
    let dtype = infer_column_type(&name, &raw)?;
    let data = column_from_json(&name, dtype, raw)?;
    frame.assign(name, data)?;
  }

  Ok(frame)
}

fn column_from_json(name: &str, dtype: ColumnType, raw: Json) -> Result<ColumnData, LiteralError> {
  let Json::Array(items) = raw else {
    return Err(LiteralError::InvalidFrame {
      message: format!("column '{}' must be an array", name),
    });
  };

  let bad_cell = || LiteralError::InvalidFrame {
    message: format!("column '{}' has a value that is not {}", name, dtype),
  };

  let data = match dtype {
    ColumnType::Integer => ColumnData::Integer(
      items
        .iter()
        .map(|v| v.as_i64().ok_or_else(bad_cell))
        .collect::<Result<_, _>>()?,
    ),
    ColumnType::Float => ColumnData::Float(
      items
        .iter()
        .map(|v| v.as_f64().ok_or_else(bad_cell))
        .collect::<Result<_, _>>()?,
    ),
    ColumnType::String => ColumnData::String(
      items
        .into_iter()
        .map(|v| match v {
          Json::String(s) => Ok(s),
          _ => Err(bad_cell()),
        })
        .collect::<Result<_, _>>()?,
    ),
    ColumnType::Boolean => ColumnData::Boolean(
      items
        .iter()
        .map(|v| v.as_bool().ok_or_else(bad_cell))
        .collect::<Result<_, _>>()?,
    ),
  };
  Ok(data)
}

fn infer_column_type(name: &str, raw: &Json) -> Result<ColumnType, LiteralError> {
  let items = raw.as_array().map(Vec::as_slice).unwrap_or_default();
  if items.iter().all(|v| v.is_i64()) {
    Ok(ColumnType::Integer)
  } else if items.iter().all(Json::is_number) {
    Ok(ColumnType::Float)
  } else if items.iter().all(Json::is_string) {
    Ok(ColumnType::String)
  } else if items.iter().all(Json::is_boolean) {
    Ok(ColumnType::Boolean)
  } else {
    Err(LiteralError::InvalidFrame {
      message: format!("cannot infer a type for column '{}'", name),
    })
  }
}

fn value_to_json(value: &Value) -> Json {
  match value {
    Value::None => Json::Null,
    Value::Integer(i) => Json::from(*i),
    Value::Float(f) => Json::from(*f),
    Value::String(s) => Json::from(s.as_str()),
    Value::Boolean(b) => Json::from(*b),
    Value::List(items) => Json::Array(items.iter().map(value_to_json).collect()),
    Value::Map(entries) | Value::Record(entries) => Json::Object(
      entries
        .iter()
        .map(|(k, v)| (k.clone(), value_to_json(v)))
        .collect(),
    ),
    Value::Frame(frame) => Json::Object(
      frame
        .columns()
        .iter()
        .map(|series| {
          let column = match &series.data {
            ColumnData::Integer(v) => Json::from(v.clone()),
            ColumnData::Float(v) => Json::from(v.clone()),
            ColumnData::String(v) => Json::from(v.clone()),
            ColumnData::Boolean(v) => Json::from(v.clone()),
          };
          (series.name.clone(), column)
        })
        .collect(),
    ),
  }
}

fn mismatch(expected: &LiteralType, found: &str) -> LiteralError {
  LiteralError::TypeMismatch {
    expected: expected.to_string(),
    found: found.to_string(),
  }
}

fn json_kind(json: &Json) -> &'static str {
  match json {
    Json::Null => "null",
    Json::Bool(_) => "boolean",
    Json::Number(_) => "number",
    Json::String(_) => "string",
    Json::Array(_) => "array",
    Json::Object(_) => "object",
  }
}
