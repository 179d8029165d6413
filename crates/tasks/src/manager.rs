//! The task lifecycle manager.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, instrument, warn};

use sentra_broker::{Command, Notification, OnFailure, TaskPublisher};
use sentra_core::config::StorageSettings;
use sentra_core::paths::Bucket;
use sentra_core::types::{Uid, SYSTEM_ACTOR};
use sentra_core::{CoreError, ProcessSignal, TaskStatus};
use sentra_store::collections::{SETTINGS, TASKS};
use sentra_store::models::{AiConfig, ArtifactRef, Settings, Task, TaskData};
use sentra_store::{DocumentStore, Filter, Update};

use crate::artifacts::remove_artifact;

/// Partial update of a task document. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub file_id: Option<Uid>,
    pub file_path: Option<String>,
    pub status: Option<TaskStatus>,
    pub file_cleaned: Option<ArtifactRef>,
    pub file_analysed: Option<ArtifactRef>,
}

/// Owns every application-initiated task transition.
///
/// Pipeline progress statuses are written by the external worker, not
/// here; the manager only queues work, relays control signals, and
/// resets or removes records.
#[derive(Clone)]
pub struct TaskLifecycleManager {
    store: Arc<dyn DocumentStore>,
    publisher: TaskPublisher,
    storage: StorageSettings,
}

impl TaskLifecycleManager {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        publisher: TaskPublisher,
        storage: StorageSettings,
    ) -> Self {
        Self {
            store,
            publisher,
            storage,
        }
    }

    // ---- reads ----

    /// First-match lookup of the task owning `file_id`.
    pub async fn find_by_file_id(&self, file_id: &Uid) -> Result<Option<Task>, CoreError> {
        let doc = self.store.find_one(TASKS, &Task::by_file_id(file_id)).await?;
        doc.map(Task::from_document).transpose().map_err(Into::into)
    }

    async fn require_by_file_id(&self, file_id: &Uid) -> Result<Task, CoreError> {
        self.find_by_file_id(file_id)
            .await?
            .ok_or_else(|| CoreError::not_found("task", file_id.as_str()))
    }

    // ---- lifecycle operations ----

    /// Register a new task. Artifact fields start empty whatever the
    /// caller passed; the write is verified by reading the record back,
    /// and a missing read-back is fatal rather than retried.
    #[instrument(skip(self, data), fields(file_id = %data.file_id))]
    pub async fn create(&self, mut data: TaskData, actor: &str) -> Result<Task, CoreError> {
        data.file_cleaned = ArtifactRef::empty();
        data.file_analysed = ArtifactRef::empty();
        let file_id = data.file_id.clone();

        let task = Task::new(data, actor);
        self.store.insert_one(TASKS, task.to_document()?).await?;

        let stored = self.find_by_file_id(&file_id).await?.ok_or_else(|| {
            CoreError::Consistency(format!(
                "task for file {file_id} not readable after insert"
            ))
        })?;

        self.publisher
            .announce(
                &Notification::status(file_id, TaskStatus::Added),
                OnFailure::Swallow,
            )
            .await?;

        info!(uid = %stored.uid, "task created");
        Ok(stored)
    }

    /// Queue a file for processing: mark its task `in_queue` and hand
    /// the work to the external worker.
    ///
    /// Calling this again while the worker is already running the file
    /// republishes the command; the worker's own bookkeeping decides
    /// what a duplicate means.
    #[instrument(skip(self))]
    pub async fn proceed(&self, file_id: &Uid, file_path: &str) -> Result<Task, CoreError> {
        let ai = self.require_ai_config().await?;

        let task = match self.find_by_file_id(file_id).await? {
            // Only the status moves; the recorded file_path stays
            // whatever the record already holds.
            Some(_) => {
                self.apply_changes(
                    &Task::by_file_id(file_id),
                    &TaskChanges {
                        status: Some(TaskStatus::InQueue),
                        ..Default::default()
                    },
                    SYSTEM_ACTOR,
                )
                .await?;
                self.require_by_file_id(file_id).await?
            }
            None => {
                self.create(
                    TaskData {
                        file_id: file_id.clone(),
                        file_path: file_path.to_string(),
                        status: TaskStatus::InQueue,
                        file_cleaned: ArtifactRef::empty(),
                        file_analysed: ArtifactRef::empty(),
                    },
                    SYSTEM_ACTOR,
                )
                .await?
            }
        };

        self.publisher
            .send_command(&Command::Proceed {
                file_id: file_id.clone(),
                file_path: file_path.to_string(),
                ai,
            })
            .await?;

        info!("task queued for processing");
        Ok(task)
    }

    /// Ask the worker to redo the pipeline from just after `last_step`.
    /// No local status change: the worker announces where it resumes.
    #[instrument(skip(self))]
    pub async fn retry_step(
        &self,
        file_id: &Uid,
        file_path: &str,
        last_step: TaskStatus,
    ) -> Result<(), CoreError> {
        let ai = self.require_ai_config().await?;
        self.publisher
            .send_command(&Command::RetryStep {
                file_id: file_id.clone(),
                file_path: file_path.to_string(),
                last_event_step: last_step,
                ai,
            })
            .await
    }

    /// Relay a pause/resume/stop signal to the worker. Fire-and-forget:
    /// the resulting `paused`/`stopped` status arrives, if at all, as a
    /// worker write like any other.
    #[instrument(skip(self))]
    pub async fn handle_process(
        &self,
        file_id: &Uid,
        signal: ProcessSignal,
    ) -> Result<(), CoreError> {
        self.publisher
            .send_command(&Command::HandleProcess {
                file_id: file_id.clone(),
                event: signal,
            })
            .await
    }

    /// Reset a task to `added`: remove both derived artifacts from disk
    /// and clear their references. Emits no notification — status
    /// announcements belong to the worker.
    #[instrument(skip(self))]
    pub async fn restart(&self, file_id: &Uid) -> Result<Task, CoreError> {
        let task = self.require_by_file_id(file_id).await?;
        self.remove_derived_artifacts(&task).await?;

        self.apply_changes(
            &Task::by_file_id(file_id),
            &TaskChanges {
                status: Some(TaskStatus::Added),
                file_cleaned: Some(ArtifactRef::empty()),
                file_analysed: Some(ArtifactRef::empty()),
                ..Default::default()
            },
            SYSTEM_ACTOR,
        )
        .await?;

        info!("task restarted");
        self.require_by_file_id(file_id).await
    }

    /// Delete a task and its derived artifacts. Returns `Ok(true)`
    /// exactly once per task; repeats and unknown ids report
    /// `Ok(false)`. Missing artifact files never fail the call.
    #[instrument(skip(self))]
    pub async fn delete_with_artifacts(&self, file_id: &Uid) -> Result<bool, CoreError> {
        let Some(task) = self.find_by_file_id(file_id).await? else {
            return Ok(false);
        };

        self.remove_derived_artifacts(&task).await?;
        let deleted = self
            .store
            .delete_one(TASKS, &Task::by_file_id(file_id))
            .await?;
        if deleted {
            info!("task deleted");
        }
        Ok(deleted)
    }

    /// Partial update by task uid, with an audit bump. This is also the
    /// write path worker-side status reporting goes through.
    pub async fn update(
        &self,
        uid: &Uid,
        changes: &TaskChanges,
        actor: &str,
    ) -> Result<Task, CoreError> {
        let filter = Task::by_uid(uid);
        if !self.apply_changes(&filter, changes, actor).await? {
            return Err(CoreError::not_found("task", uid.as_str()));
        }
        let doc = self
            .store
            .find_one(TASKS, &filter)
            .await?
            .ok_or_else(|| CoreError::not_found("task", uid.as_str()))?;
        Task::from_document(doc).map_err(Into::into)
    }

    // ---- internals ----

    async fn apply_changes(
        &self,
        filter: &Filter,
        changes: &TaskChanges,
        actor: &str,
    ) -> Result<bool, CoreError> {
        let mut update = Update::new()
            .set("updatedAt", json!(chrono::Utc::now()))
            .set("updatedBy", actor);
        if let Some(file_id) = &changes.file_id {
            update = update.set("data.file_id", file_id.as_str());
        }
        if let Some(file_path) = &changes.file_path {
            update = update.set("data.file_path", file_path.as_str());
        }
        if let Some(status) = changes.status {
            update = update.set("data.status", json!(status));
        }
        if let Some(cleaned) = &changes.file_cleaned {
            update = update.set("data.file_cleaned", json!(cleaned));
        }
        if let Some(analysed) = &changes.file_analysed {
            update = update.set("data.file_analysed", json!(analysed));
        }
        Ok(self.store.update_one(TASKS, filter, &update).await?)
    }

    async fn remove_derived_artifacts(&self, task: &Task) -> Result<(), CoreError> {
        remove_artifact(
            &self.storage,
            &task.data.file_id,
            Bucket::Cleaned,
            task.data.file_cleaned.path.as_deref(),
        )
        .await?;
        remove_artifact(
            &self.storage,
            &task.data.file_id,
            Bucket::Analysed,
            task.data.file_analysed.path.as_deref(),
        )
        .await?;
        Ok(())
    }

    /// The worker cannot run without a configured AI block; refuse to
    /// publish a command that would only fail later.
    async fn require_ai_config(&self) -> Result<AiConfig, CoreError> {
        let doc = self.store.find_one(SETTINGS, &Filter::all()).await?;
        let settings = doc
            .map(Settings::from_document)
            .transpose()?
            .ok_or_else(|| CoreError::Configuration("application settings missing".into()))?;
        settings.data.ai.ok_or_else(|| {
            warn!("refusing to queue work without an AI configuration");
            CoreError::Configuration("AI configuration missing from settings".into())
        })
    }
}
