//! Durable key-value storage backends used to persist the bearer credential.
//!
//! Provides an in-memory store for testing and a JSON-file store for production.

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::InMemoryStorage;
