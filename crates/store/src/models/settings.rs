//! Global settings, including the AI processing profile required by
//! `proceed`/`retry`. Stored as a single document read with an empty
//! filter.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sentra_core::types::{generate_uid, Timestamp, Uid};

use crate::adapter::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiMode {
    Local,
    Automatic,
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiPreferences {
    pub mode: AiMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_local_model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_external_model_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiModelData {
    pub model: String,
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
    /// Capped at 10 by the settings UI.
    #[serde(rename = "retryRequests")]
    pub retry_requests: u32,
    /// Capped at 5000 by the settings UI.
    #[serde(rename = "paginateRowsLimit")]
    pub paginate_rows_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiModel {
    pub uid: Uid,
    pub data: AiModelData,
}

/// The processing profile embedded into `proceed_task`/`retry_step`
/// command payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub preferences: AiPreferences,
    #[serde(default)]
    pub local: Vec<AiModel>,
    #[serde(default)]
    pub external: Vec<AiModel>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsData {
    /// Absent until an operator configures the processing profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai: Option<AiConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub uid: Uid,
    pub data: SettingsData,
    pub created_at: Timestamp,
    pub created_by: String,
    pub updated_at: Timestamp,
    pub updated_by: String,
}

impl Settings {
    pub fn new(data: SettingsData, actor: &str) -> Self {
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

    pub fn to_document(&self) -> Result<Value, StoreError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_document(doc: Value) -> Result<Self, StoreError> {
        Ok(serde_json::from_value(doc)?)
    }
}
