//! The document-store seam.

use async_trait::async_trait;
use serde_json::Value;

use sentra_core::CoreError;

use crate::filter::{Filter, FindOptions, Update};

/// Adapter-level failures. Mapped to [`CoreError::Store`] at the domain
/// boundary so callers never see backend specifics.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        CoreError::Store(e.to_string())
    }
}

/// Generic key/filter document store over named collections.
///
/// Contract notes:
/// - `find_one` returns the **first** match in insertion order; the
///   pipeline relies on first-match semantics for its one-task-per-file
///   invariant.
/// - `update_one`/`delete_one` touch at most one document and report
///   whether one was touched.
/// - No cross-collection transactions are provided or assumed.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(&self, collection: &str, filter: &Filter)
        -> Result<Option<Value>, StoreError>;

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Value>, StoreError>;

    /// Insert a document and return it as stored.
    async fn insert_one(&self, collection: &str, document: Value) -> Result<Value, StoreError>;

    /// Apply a partial update to the first matching document. Returns
    /// `true` if a document was updated.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<bool, StoreError>;

    /// Delete the first matching document. Returns `true` if one was
    /// deleted.
    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<bool, StoreError>;
}
