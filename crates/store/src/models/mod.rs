//! Typed views over the stored JSON documents.
//!
//! Documents share one envelope shape: `uid`, a `data` object
//! carrying the domain fields, and camelCase audit fields. The typed
//! structs round-trip through `serde_json::Value` at the adapter seam.

mod file;
mod settings;
mod task;

pub use file::{FileData, FileRecord};
pub use settings::{AiConfig, AiMode, AiModel, AiModelData, AiPreferences, Settings, SettingsData};
pub use task::{ArtifactRef, Task, TaskData};
