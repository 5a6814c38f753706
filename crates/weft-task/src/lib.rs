//! Weft Task
//!
//! Task code is plain Rust: an async function from a [`LiteralMap`] of inputs to a
//! [`LiteralMap`] of outputs. A [`TaskCatalog`] is the side table that pairs a
//! stable handler name with the task's declared [`Interface`] and its invocation
//! wrapper. Registered task definitions refer to catalog entries by handler name.
//!
//! [`LiteralMap`]: weft_literal::LiteralMap
//! [`Interface`]: weft_literal::Interface

mod catalog;
mod error;
mod task;

pub use catalog::{CatalogEntry, TaskCatalog, TaskCatalogBuilder, TaskSpec};
pub use error::{CatalogError, ErrorKind, TaskError};
pub use task::{FnTask, TaskContext, TaskFn, fn_task, input};
