//! Port adapters.

mod memory;

pub use memory::{InMemoryEntityRegistry, InMemoryEntityStore, InMemoryForkStore};
