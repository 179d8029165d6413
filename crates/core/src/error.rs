use std::path::PathBuf;

/// Error taxonomy shared across the pipeline core.
///
/// Best-effort notification paths swallow `TransientBroker` at the publish
/// boundary (logged only); everything else propagates unchanged to the
/// caller. The core performs no automatic retries.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An operation referenced an unknown task, file, or artifact.
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    /// `proceed`/`retry` invoked without a configured processing profile.
    /// No command is published in this case.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Broker connect/publish failure on an explicit user command path.
    #[error("Broker unavailable: {0}")]
    TransientBroker(String),

    /// Artifact deletion failed for a reason other than "already absent".
    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A just-inserted record could not be read back. Store-consistency
    /// lag is treated as fatal rather than silently continuing.
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// The document store adapter failed.
    #[error("Store error: {0}")]
    Store(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}
