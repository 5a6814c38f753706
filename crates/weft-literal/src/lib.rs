//! Weft Literal
//!
//! Every value that crosses a node boundary in weft is a [`TypedLiteral`]: a runtime
//! [`Value`] paired with the [`LiteralType`] it was declared with. This crate owns:
//!
//! - the type language and its assignability rules (used by the compiler at bind time)
//! - dataframe values and the composable [`Schema`] records that type them
//! - the versioned byte codec literals are persisted with
//! - the [`LiteralStore`] an execution keeps its workflow inputs and node outputs in

mod codec;
mod error;
mod frame;
mod interface;
mod json;
mod literal;
mod schema;
mod store;
mod types;

pub use codec::{ENVELOPE_VERSION, decode, encode};
pub use error::LiteralError;
pub use frame::{ColumnData, DataFrame, Series};
pub use interface::Interface;
pub use json::{from_json, to_json};
pub use literal::{LiteralMap, TypedLiteral, Value};
pub use schema::{Check, CheckScope, Constraint, Field, Schema};
pub use store::{LiteralStore, SlotKey};
pub use types::{ColumnType, LiteralType};
