//! Removal of derived artifact files.

use tracing::{debug, warn};

use sentra_core::config::StorageSettings;
use sentra_core::paths::{self, Bucket, Origin};
use sentra_core::types::Uid;
use sentra_core::CoreError;

/// Delete one derived artifact if it exists.
///
/// The stored path may have been written under a foreign mount root, so
/// it goes through the resolver first. A file that is already gone is a
/// success (`Ok(false)`); only real I/O failures surface.
pub async fn remove_artifact(
    storage: &StorageSettings,
    file_id: &Uid,
    bucket: Bucket,
    stored: Option<&str>,
) -> Result<bool, CoreError> {
    let resolved = paths::resolve(storage, file_id, bucket, stored);
    if resolved.origin == Origin::Fallback {
        warn!(
            %file_id,
            %bucket,
            stored = stored.unwrap_or_default(),
            "stored artifact path was ambiguous, removing canonical location instead"
        );
    }

    match tokio::fs::remove_file(resolved.path()).await {
        Ok(()) => {
            debug!(%file_id, path = %resolved.path.display(), "artifact removed");
            Ok(true)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(CoreError::Filesystem {
            path: resolved.path,
            source: err,
        }),
    }
}
