//! Built-in demo tasks: the payroll pipeline from `demos/pandera.json`.

use weft_literal::{
  Check, ColumnData, ColumnType, DataFrame, Field, LiteralMap, LiteralType, Schema, TypedLiteral,
};
use weft_task::{CatalogError, TaskCatalog, TaskContext, TaskError, TaskSpec, input};

pub fn in_schema() -> Schema {
  Schema::new("InSchema")
    .field(Field::new("hourly_pay", ColumnType::Float).ge(7.0))
    .field(Field::new("hours_worked", ColumnType::Float).ge(10.0))
    .check(Check::columns(
      "check_numbers_are_positive",
      ["hourly_pay", "hours_worked"],
    ))
}

pub fn intermediate_schema() -> Schema {
  in_schema()
    .extend("IntermediateSchema")
    .field(Field::new("total_pay", ColumnType::Float))
    .check(Check::frame("check_total_pay"))
}

pub fn out_schema() -> Schema {
  intermediate_schema()
    .extend("OutSchema")
    .field(Field::new("worker_id", ColumnType::String).unique())
}

/// Catalog with every built-in task.
pub fn catalog() -> Result<TaskCatalog, CatalogError> {
  TaskCatalog::builder()
    .register_fn(
      TaskSpec::new("total_pay")
        .input("df", LiteralType::dataframe(in_schema()))
        .output("total_pay_col", LiteralType::dataframe(intermediate_schema())),
      total_pay,
    )
    .register_fn(
      TaskSpec::new("add_id")
        .input("total_pay_col", LiteralType::dataframe(intermediate_schema()))
        .input("id", LiteralType::String)
        .output("out", LiteralType::dataframe(out_schema())),
      add_id,
    )
    .build()
}

fn frame<'a>(inputs: &'a LiteralMap, name: &str) -> Result<&'a DataFrame, TaskError> {
  input(inputs, name)?
    .value()
    .as_frame()
    .ok_or_else(|| TaskError::permanent(format!("input '{name}' is not a dataframe")))
}

fn float_column<'a>(frame: &'a DataFrame, name: &str) -> Result<&'a [f64], TaskError> {
  frame
    .column(name)
    .and_then(ColumnData::as_float)
    .ok_or_else(|| TaskError::permanent(format!("missing float column '{name}'")))
}

/// `total_pay = hourly_pay * hours_worked`
async fn total_pay(_ctx: TaskContext, inputs: LiteralMap) -> Result<LiteralMap, TaskError> {
  let df = frame(&inputs, "df")?;
  let pay = float_column(df, "hourly_pay")?;
  let hours = float_column(df, "hours_worked")?;
  let total = pay.iter().zip(hours).map(|(p, h)| p * h).collect();

  let out = df.clone().with_column("total_pay", ColumnData::Float(total))?;
  Ok(LiteralMap::from([(
    "total_pay_col".to_string(),
    TypedLiteral::frame(intermediate_schema(), out)?,
  )]))
}

async fn add_id(_ctx: TaskContext, inputs: LiteralMap) -> Result<LiteralMap, TaskError> {
  let df = frame(&inputs, "total_pay_col")?;
  let id = input(&inputs, "id")?
    .value()
    .as_str()
    .ok_or_else(|| TaskError::permanent("input 'id' is not a string"))?;

  let rows = df.num_rows().unwrap_or(0);
  let out = df
    .clone()
    .with_column("worker_id", ColumnData::String(vec![id.to_string(); rows]))?;
  Ok(LiteralMap::from([(
    "out".to_string(),
    TypedLiteral::frame(out_schema(), out)?,
  )]))
}
