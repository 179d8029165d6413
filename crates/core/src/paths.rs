//! Artifact path resolution across execution environments.
//!
//! The component that writes an artifact path and the component that
//! later reads it may mount the same physical volume under different
//! absolute roots, so a stored path can be foreign to the reader. This
//! module re-roots such paths under the local storage root.
//!
//! Resolution is pure and deterministic: it never checks the disk.
//! Callers that need existence must check separately so that "resolved
//! but missing on disk" and "path could not be pattern-matched" stay
//! distinguishable failure classes.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::StorageSettings;
use crate::types::Uid;

/// Artifact bucket: one directory per processing stage output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Original uploads.
    Datasets,
    /// Output of the cleaning stage.
    Cleaned,
    /// Output of the analysis stage.
    Analysed,
}

/// All buckets, in pipeline order.
pub const BUCKETS: &[Bucket] = &[Bucket::Datasets, Bucket::Cleaned, Bucket::Analysed];

impl Bucket {
    /// Directory name under the storage root.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Datasets => "datasets",
            Self::Cleaned => "cleaned",
            Self::Analysed => "analysed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "datasets" => Some(Self::Datasets),
            "cleaned" => Some(Self::Cleaned),
            "analysed" => Some(Self::Analysed),
            _ => None,
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stored path was mapped to a local one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// No stored path; canonical construction from `file_id`.
    Canonical,
    /// Stored path was relative (environment-portable format), joined
    /// onto the local root.
    Relative,
    /// Stored path was absolute and its trailing `{bucket}/{filename}`
    /// segment was re-rooted locally.
    Rerooted,
    /// Stored path was absolute but could not be pattern-matched; the
    /// canonical path was used instead. Callers should log this.
    Fallback,
}

/// A resolved artifact location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub path: PathBuf,
    pub origin: Origin,
}

impl Resolved {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The deterministic `{root}/{bucket}/{file_id}.csv` location.
pub fn canonical_path(storage: &StorageSettings, file_id: &Uid, bucket: Bucket) -> PathBuf {
    storage
        .root()
        .join(bucket.as_str())
        .join(format!("{file_id}.csv"))
}

/// Resolve a possibly-foreign stored path to a local absolute path.
///
/// Rules, in order:
/// 1. no stored path — canonical;
/// 2. relative stored path — joined onto the local root;
/// 3. absolute stored path with a recognizable `{bucket}/{filename}`
///    tail — re-rooted locally via [`split_legacy`];
/// 4. anything else — canonical fallback.
pub fn resolve(
    storage: &StorageSettings,
    file_id: &Uid,
    bucket: Bucket,
    stored: Option<&str>,
) -> Resolved {
    let Some(stored) = stored else {
        return Resolved {
            path: canonical_path(storage, file_id, bucket),
            origin: Origin::Canonical,
        };
    };

    if !is_absolute_like(stored) {
        return Resolved {
            path: storage.root().join(stored),
            origin: Origin::Relative,
        };
    }

    match split_legacy(stored) {
        Some((stored_bucket, filename)) => Resolved {
            path: storage.root().join(stored_bucket.as_str()).join(filename),
            origin: Origin::Rerooted,
        },
        None => Resolved {
            path: canonical_path(storage, file_id, bucket),
            origin: Origin::Fallback,
        },
    }
}

/// Treat Unix-absolute and Windows drive-letter paths as absolute,
/// whatever platform we are running on — stored paths may have been
/// written by either kind of writer.
fn is_absolute_like(stored: &str) -> bool {
    if Path::new(stored).is_absolute() || stored.starts_with('/') {
        return true;
    }
    let bytes = stored.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Legacy adapter: extract the trailing `{bucket}/{filename}` segment
/// from an absolute path written under a foreign mount root.
///
/// The first path component matching a bucket literal wins, and the
/// final component is taken as the filename (buckets are leaf
/// directories in every writer's layout). Returns `None` when no
/// bucket component precedes a filename.
pub fn split_legacy(stored: &str) -> Option<(Bucket, String)> {
    let components: Vec<&str> = stored
        .split(['/', '\\'])
        .filter(|c| !c.is_empty())
        .collect();

    let bucket_pos = components
        .iter()
        .position(|c| Bucket::parse(c).is_some())?;
    // The bucket must be a directory, not the final component.
    if bucket_pos + 1 >= components.len() {
        return None;
    }

    let bucket = Bucket::parse(components[bucket_pos])?;
    let filename = components.last()?.to_string();
    Some((bucket, filename))
}
