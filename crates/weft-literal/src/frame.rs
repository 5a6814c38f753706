use serde::{Deserialize, Serialize};

use crate::error::LiteralError;
use crate::types::ColumnType;

/// Column storage for a single series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnData {
  Integer(Vec<i64>),
  Float(Vec<f64>),
  String(Vec<String>),
  Boolean(Vec<bool>),
}

impl ColumnData {
  pub fn len(&self) -> usize {
    match self {
      ColumnData::Integer(v) => v.len(),
      ColumnData::Float(v) => v.len(),
      ColumnData::String(v) => v.len(),
      ColumnData::Boolean(v) => v.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn dtype(&self) -> ColumnType {
    match self {
      ColumnData::Integer(_) => ColumnType::Integer,
      ColumnData::Float(_) => ColumnType::Float,
      ColumnData::String(_) => ColumnType::String,
      ColumnData::Boolean(_) => ColumnType::Boolean,
    }
  }

  pub fn as_float(&self) -> Option<&[f64]> {
    match self {
      ColumnData::Float(v) => Some(v),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&[String]> {
    match self {
      ColumnData::String(v) => Some(v),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
  pub name: String,
  pub data: ColumnData,
}

/// An ordered set of named, equal-length columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataFrame {
  columns: Vec<Series>,
}

impl DataFrame {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builder form of [`DataFrame::assign`].
  pub fn with_column(
    mut self,
    name: impl Into<String>,
    data: ColumnData,
  ) -> Result<Self, LiteralError> {
    self.assign(name, data)?;
    Ok(self)
  }

  /// Add a column, or replace the column with the same name.
  ///
  /// The column length must match the existing row count.
  pub fn assign(&mut self, name: impl Into<String>, data: ColumnData) -> Result<(), LiteralError> {
    let name = name.into();
    if let Some(rows) = self.num_rows() {
      let replacing_only_column = self.columns.len() == 1 && self.columns[0].name == name;
      if data.len() != rows && !replacing_only_column {
        return Err(LiteralError::InvalidFrame {
          message: format!(
            "column '{}' has {} rows, frame has {}",
            name,
            data.len(),
            rows
          ),
        });
      }
    }

    match self.columns.iter_mut().find(|s| s.name == name) {
      Some(existing) => existing.data = data,
      None => self.columns.push(Series { name, data }),
    }
    Ok(())
  }

  pub fn column(&self, name: &str) -> Option<&ColumnData> {
    self.columns.iter().find(|s| s.name == name).map(|s| &s.data)
  }

  pub fn columns(&self) -> &[Series] {
    &self.columns
  }

  /// Row count, or `None` for a frame without columns.
  pub fn num_rows(&self) -> Option<usize> {
    self.columns.first().map(|s| s.data.len())
  }

  /// Check that column names are unique and all columns have the same length.
  ///
  /// Frames built through [`DataFrame::assign`] always pass; deserialized frames
  /// may not.
  pub fn validate(&self) -> Result<(), LiteralError> {
    let rows = self.num_rows().unwrap_or(0);
    for (i, series) in self.columns.iter().enumerate() {
      if series.data.len() != rows {
        return Err(LiteralError::InvalidFrame {
          message: format!(
            "column '{}' has {} rows, frame has {}",
            series.name,
            series.data.len(),
            rows
          ),
        });
      }
      if self.columns[..i].iter().any(|s| s.name == series.name) {
        return Err(LiteralError::InvalidFrame {
          message: format!("duplicate column '{}'", series.name),
        });
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_assign_rejects_ragged_column() {
    let mut frame = DataFrame::new()
      .with_column("a", ColumnData::Float(vec![1.0, 2.0]))
      .unwrap();

    let err = frame
      .assign("b", ColumnData::Integer(vec![1]))
      .unwrap_err();
    assert!(matches!(err, LiteralError::InvalidFrame { .. }));
  }

  #[test]
  fn test_assign_replaces_existing_column() {
    let mut frame = DataFrame::new()
      .with_column("a", ColumnData::Float(vec![1.0, 2.0]))
      .unwrap()
      .with_column("b", ColumnData::Boolean(vec![true, false]))
      .unwrap();

    frame
      .assign("a", ColumnData::String(vec!["x".into(), "y".into()]))
      .unwrap();

    assert_eq!(frame.columns().len(), 2);
    assert_eq!(frame.column("a").unwrap().dtype(), ColumnType::String);
    assert_eq!(frame.num_rows(), Some(2));
  }

  #[test]
  fn test_validate_catches_duplicates() {
    let frame: DataFrame = serde_json::from_value(serde_json::json!({
      "columns": [
        {"name": "a", "data": {"integer": [1]}},
        {"name": "a", "data": {"integer": [2]}}
      ]
    }))
    .unwrap();

    assert!(frame.validate().is_err());
  }
}
