//! Persisted configuration
//!
//! Holds the encoder location and the store it is read from and written to.

mod store;

pub use store::{JsonPathStore, MemoryPathStore, PathStore};
