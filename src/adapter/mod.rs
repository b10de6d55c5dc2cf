//! Backend adapters.
//!
//! Only the embedded in-memory pair ships with the crate; adapters for
//! real backends implement the same port traits and are injected through
//! [`StorageFactory::with_backends`](crate::factory::StorageFactory::with_backends).

pub mod memory;

pub use memory::{MemoryGraphStore, MemoryVectorStore};
