//! Dataframe schemas.
//!
//! A schema is a named, ordered list of field constraint records plus references to
//! named check functions. Schemas never inherit from each other; a derived schema is
//! built by composition: the base fields are copied in order and any field or check
//! declared again under the same name replaces the earlier one in place.
//!
//! ```
//! use weft_literal::{ColumnType, Field, Schema};
//!
//! let input = Schema::new("InSchema")
//!   .field(Field::new("hourly_pay", ColumnType::Float).ge(7.0))
//!   .field(Field::new("hours_worked", ColumnType::Float).ge(10.0));
//!
//! let intermediate = input
//!   .extend("IntermediateSchema")
//!   .field(Field::new("total_pay", ColumnType::Float).ge(100.0));
//!
//! assert_eq!(intermediate.fields.len(), 3);
//! ```
//!
//! Constraints and checks are carried as data for an external validation layer;
//! nothing in weft evaluates them.

use serde::{Deserialize, Serialize};

use crate::types::ColumnType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
  pub name: String,
  #[serde(default)]
  pub fields: Vec<Field>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub checks: Vec<Check>,
}

impl Schema {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      fields: Vec::new(),
      checks: Vec::new(),
    }
  }

  /// Add a field, replacing any existing field with the same name.
  pub fn field(mut self, field: Field) -> Self {
    match self.fields.iter_mut().find(|f| f.name == field.name) {
      Some(existing) => *existing = field,
      None => self.fields.push(field),
    }
    self
  }

  /// Add a check, replacing any existing check with the same name.
  pub fn check(mut self, check: Check) -> Self {
    match self.checks.iter_mut().find(|c| c.name == check.name) {
      Some(existing) => *existing = check,
      None => self.checks.push(check),
    }
    self
  }

  /// Start a new schema from this one's fields and checks.
  pub fn extend(&self, name: impl Into<String>) -> Schema {
    Schema {
      name: name.into(),
      fields: self.fields.clone(),
      checks: self.checks.clone(),
    }
  }

  /// Concatenate several schemas in order, later declarations overriding by name.
  pub fn compose<'a>(
    name: impl Into<String>,
    parts: impl IntoIterator<Item = &'a Schema>,
  ) -> Schema {
    parts.into_iter().fold(Schema::new(name), |acc, part| {
      let acc = part.fields.iter().cloned().fold(acc, Schema::field);
      part.checks.iter().cloned().fold(acc, Schema::check)
    })
  }

  pub fn field_named(&self, name: &str) -> Option<&Field> {
    self.fields.iter().find(|f| f.name == name)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
  pub name: String,
  pub dtype: ColumnType,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub constraints: Vec<Constraint>,
}

impl Field {
  pub fn new(name: impl Into<String>, dtype: ColumnType) -> Self {
    Self {
      name: name.into(),
      dtype,
      constraints: Vec::new(),
    }
  }

  pub fn ge(self, bound: f64) -> Self {
    self.constraint(Constraint::Ge(bound))
  }

  pub fn gt(self, bound: f64) -> Self {
    self.constraint(Constraint::Gt(bound))
  }

  pub fn le(self, bound: f64) -> Self {
    self.constraint(Constraint::Le(bound))
  }

  pub fn lt(self, bound: f64) -> Self {
    self.constraint(Constraint::Lt(bound))
  }

  pub fn unique(self) -> Self {
    self.constraint(Constraint::Unique)
  }

  fn constraint(mut self, constraint: Constraint) -> Self {
    self.constraints.push(constraint);
    self
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Constraint {
  Ge(f64),
  Gt(f64),
  Le(f64),
  Lt(f64),
  Unique,
}

/// Reference to a named check function owned by the validation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
  pub name: String,
  #[serde(default)]
  pub scope: CheckScope,
}

impl Check {
  pub fn frame(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      scope: CheckScope::Frame,
    }
  }

  pub fn columns<I, S>(name: impl Into<String>, columns: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      name: name.into(),
      scope: CheckScope::Columns(columns.into_iter().map(Into::into).collect()),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckScope {
  #[default]
  Frame,
  Columns(Vec<String>),
}

#[cfg(test)]
mod tests {
  use super::*;

  fn in_schema() -> Schema {
    Schema::new("InSchema")
      .field(Field::new("hourly_pay", ColumnType::Float).ge(7.0))
      .field(Field::new("hours_worked", ColumnType::Float).ge(10.0))
  }

  #[test]
  fn test_extend_keeps_base_order() {
    let out = in_schema()
      .extend("OutSchema")
      .field(Field::new("total_pay", ColumnType::Float))
      .field(Field::new("worker_id", ColumnType::String).unique());

    let names: Vec<_> = out.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
      names,
      vec!["hourly_pay", "hours_worked", "total_pay", "worker_id"]
    );
    assert_eq!(out.name, "OutSchema");
  }

  #[test]
  fn test_redeclared_field_overrides_in_place() {
    let relaxed = in_schema()
      .extend("Relaxed")
      .field(Field::new("hourly_pay", ColumnType::Float));

    assert_eq!(relaxed.fields.len(), 2);
    assert_eq!(relaxed.fields[0].name, "hourly_pay");
    assert!(relaxed.fields[0].constraints.is_empty());
  }

  #[test]
  fn test_compose_overrides_checks_by_name() {
    let a = Schema::new("A").check(Check::frame("no_nulls"));
    let b = Schema::new("B")
      .field(Field::new("id", ColumnType::String))
      .check(Check::columns("no_nulls", ["id"]));

    let composed = Schema::compose("AB", [&a, &b]);
    assert_eq!(composed.checks.len(), 1);
    assert_eq!(
      composed.checks[0].scope,
      CheckScope::Columns(vec!["id".to_string()])
    );
    assert!(composed.field_named("id").is_some());
  }

  #[test]
  fn test_constraint_serde_shape() {
    let field = Field::new("hours", ColumnType::Float).ge(10.0).unique();
    let json = serde_json::to_value(&field).unwrap();
    assert_eq!(
      json,
      serde_json::json!({
        "name": "hours",
        "dtype": "float",
        "constraints": [{"kind": "ge", "value": 10.0}, {"kind": "unique"}]
      })
    );
  }
}
