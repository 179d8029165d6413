//! The File record: an uploaded dataset. Immutable after creation
//! except for deletion.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sentra_core::types::{generate_uid, Timestamp, Uid};

use crate::adapter::StoreError;
use crate::filter::Filter;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileData {
    pub filename: String,
    pub size: u64,
    /// Canonical at write time; readers must resolve through
    /// `sentra_core::paths` before touching the disk.
    pub file_path: String,
    pub extension: String,
    #[serde(rename = "type")]
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub uid: Uid,
    pub data: FileData,
    pub created_at: Timestamp,
    pub created_by: String,
    pub updated_at: Timestamp,
    pub updated_by: String,
}

impl FileRecord {
    pub fn new(data: FileData, actor: &str) -> Self {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_round_trip() {
        let record = FileRecord::new(
            FileData {
                filename: "tweets.csv".into(),
                size: 1024,
                file_path: "/srv/storage/datasets/f1.csv".into(),
                extension: ".csv".into(),
                mime_type: "text/csv".into(),
            },
            "uploader",
        );
        let doc = record.to_document().unwrap();
        assert_eq!(doc["data"]["type"], "text/csv");
        assert_eq!(doc["createdBy"], "uploader");

        let back = FileRecord::from_document(doc).unwrap();
        assert_eq!(back.uid, record.uid);
        assert_eq!(back.data.size, 1024);
    }
}
