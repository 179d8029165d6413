//! Generic document-store adapter and typed record models.
//!
//! The pipeline core treats persistence as a black box: a handful of
//! collections holding JSON documents, addressed by dotted-path filters
//! (e.g. `data.file_id`). [`DocumentStore`] is the seam; [`MemoryStore`]
//! is the in-process implementation used by tests and the simulator.
//! No transactions across collections are assumed anywhere.

pub mod adapter;
pub mod collections;
pub mod document;
pub mod filter;
pub mod memory;
pub mod models;

pub use adapter::{DocumentStore, StoreError};
pub use filter::{Filter, FindOptions, Sort, Update};
pub use memory::MemoryStore;
