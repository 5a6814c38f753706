mod cache;
mod compiler;
mod error;

pub use cache::GraphCache;
pub use compiler::{Compiler, StandardCompiler};
pub use error::CompileError;
