//! Environment-backed configuration.
//!
//! Read once at startup into plain structs; library code only ever sees
//! the structs. `dotenvy` loading is the binary's job.

use std::env;
use std::path::{Path, PathBuf};

use crate::error::CoreError;

/// `STORAGE_PATH` — artifact storage root. May be absolute or relative.
pub const ENV_STORAGE_PATH: &str = "STORAGE_PATH";

/// `BROKER_TOPIC_TASKS` — name of the topic exchange carrying task traffic.
pub const ENV_BROKER_TOPIC: &str = "BROKER_TOPIC_TASKS";

const DEFAULT_STORAGE_PATH: &str = "storage";
const DEFAULT_BROKER_TOPIC: &str = "tasks";

/// Local artifact storage root, computed once per process.
///
/// A relative `STORAGE_PATH` is anchored to the directory containing the
/// running executable, never the ambient working directory, so path
/// resolution behaves identically no matter where the process was
/// launched from. Writers in other environments may mount the same
/// physical volume under a different root; see [`crate::paths`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    root: PathBuf,
}

impl StorageSettings {
    /// Build from an explicit root. Used by tests and by callers that
    /// manage their own anchoring.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Read `STORAGE_PATH` and anchor it.
    pub fn from_env() -> Result<Self, CoreError> {
        let raw = env::var(ENV_STORAGE_PATH).unwrap_or_else(|_| DEFAULT_STORAGE_PATH.into());
        let path = PathBuf::from(&raw);
        if path.is_absolute() {
            return Ok(Self { root: path });
        }

        let exe = env::current_exe().map_err(|e| {
            CoreError::Configuration(format!("cannot locate executable for storage anchor: {e}"))
        })?;
        let anchor = exe.parent().ok_or_else(|| {
            CoreError::Configuration("executable path has no parent directory".into())
        })?;
        Ok(Self {
            root: anchor.join(path),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Broker exchange configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    pub exchange: String,
}

impl BrokerSettings {
    pub fn from_env() -> Self {
        Self {
            exchange: env::var(ENV_BROKER_TOPIC).unwrap_or_else(|_| DEFAULT_BROKER_TOPIC.into()),
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            exchange: DEFAULT_BROKER_TOPIC.into(),
        }
    }
}
