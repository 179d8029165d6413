//! Sentra domain core: status state machine, error taxonomy, storage
//! configuration, and artifact path resolution.
//!
//! Everything in this crate is synchronous and side-effect free (the one
//! exception being [`config`], which reads environment variables). The
//! async machinery lives in the `store`, `broker`, `tasks`, and `watch`
//! crates.

pub mod config;
pub mod error;
pub mod paths;
pub mod status;
pub mod types;

pub use error::CoreError;
pub use status::{ProcessSignal, TaskStatus};
