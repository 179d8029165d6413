//! The Task record: one file's progress through the pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sentra_core::types::{generate_uid, Timestamp, Uid};
use sentra_core::TaskStatus;

use crate::adapter::StoreError;
use crate::filter::Filter;

/// Location and MIME type of a derived artifact. Both fields stay null
/// until the corresponding stage's `-done` status has been observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub path: Option<String>,
    #[serde(rename = "type")]
    pub mime_type: Option<String>,
}

impl ArtifactRef {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_none() && self.mime_type.is_none()
    }
}

/// Domain fields of a task document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskData {
    pub file_id: Uid,
    pub file_path: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub file_cleaned: ArtifactRef,
    #[serde(default)]
    pub file_analysed: ArtifactRef,
}

/// A task document with its envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub uid: Uid,
    pub data: TaskData,
    pub created_at: Timestamp,
    pub created_by: String,
    pub updated_at: Timestamp,
    pub updated_by: String,
}

impl Task {
    /// Build a fresh record with a generated uid and audit fields.
    pub fn new(data: TaskData, actor: &str) -> Self {
        let now = chrono::Utc::now();
        Self {
            uid: generate_uid(),
            data,
            created_at: now,
            created_by: actor.to_string(),
            updated_at: now,
            updated_by: actor.to_string(),
        }
    }

    /// First-match filter for the task owning `file_id`. The pipeline
    /// keeps at most one meaningfully addressable task per file.
    pub fn by_file_id(file_id: &Uid) -> Filter {
        Filter::by("data.file_id", file_id.as_str())
    }

    pub fn by_uid(uid: &Uid) -> Filter {
        Filter::by("uid", uid.as_str())
    }

    pub fn to_document(&self) -> Result<Value, StoreError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_document(doc: Value) -> Result<Self, StoreError> {
        Ok(serde_json::from_value(doc)?)
    }
}
