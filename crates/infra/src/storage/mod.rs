//! State store adapters
//!
//! Two implementations of the core persistence port: an in-memory store
//! for tests and ephemeral setups, and a JSON file store for durable state.

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStateStore;
