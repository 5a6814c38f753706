mod error;
mod memory;
mod registry;

pub use error::RegistryError;
pub use memory::InMemoryRegistry;
pub use registry::{Entry, Page, Registry};
