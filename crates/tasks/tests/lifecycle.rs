//! Cross-crate lifecycle scenarios: manager + memory store + local
//! broker, with a test standing in for the external worker's writes.

use std::sync::Arc;

use assert_matches::assert_matches;

use sentra_broker::exchange::Exchange;
use sentra_broker::{Broker, Command, Subscription, TaskPublisher};
use sentra_core::config::StorageSettings;
use sentra_core::types::Uid;
use sentra_core::{CoreError, ProcessSignal, TaskStatus};
use sentra_store::collections::SETTINGS;
use sentra_store::models::{
    AiConfig, AiMode, AiPreferences, ArtifactRef, Settings, SettingsData, Task, TaskData,
};
use sentra_store::{DocumentStore, Filter, FindOptions, MemoryStore, StoreError, Update};
use sentra_tasks::{TaskChanges, TaskLifecycleManager};

struct Harness {
    store: Arc<MemoryStore>,
    exchange: Arc<Exchange>,
    manager: TaskLifecycleManager,
    _dir: tempfile::TempDir,
    root: std::path::PathBuf,
}

async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let store = Arc::new(MemoryStore::new());
    let exchange = Arc::new(Exchange::new("tasks"));
    let publisher = TaskPublisher::new(Arc::new(Broker::local(exchange.clone())));
    let manager = TaskLifecycleManager::new(
        store.clone(),
        publisher,
        StorageSettings::with_root(&root),
    );
    Harness {
        store,
        exchange,
        manager,
        _dir: dir,
        root,
    }
}

async fn seed_settings(store: &MemoryStore) {
    let settings = Settings::new(
        SettingsData {
            ai: Some(AiConfig {
                preferences: AiPreferences {
                    mode: AiMode::Automatic,
                    default_local_model_id: None,
                    default_external_model_id: None,
                },
                local: vec![],
                external: vec![],
            }),
        },
        "test",
    );
    store
        .insert_one(SETTINGS, settings.to_document().unwrap())
        .await
        .unwrap();
}

fn task_data(file_id: &str) -> TaskData {
    TaskData {
        file_id: file_id.into(),
        file_path: format!("datasets/{file_id}.csv"),
        status: TaskStatus::Added,
        file_cleaned: ArtifactRef::empty(),
        file_analysed: ArtifactRef::empty(),
    }
}

async fn next_command(sub: &mut Subscription) -> Command {
    let delivery = sub.recv().await.expect("command subscription closed");
    Command::decode(&delivery).expect("undecodable command")
}

#[tokio::test]
async fn create_defaults_artifacts_and_verifies_read_back() {
    let h = harness().await;
    let mut data = task_data("f1");
    data.file_cleaned.path = Some("stale".into()); // must be ignored

    let task = h.manager.create(data, "alice").await.unwrap();
    assert_eq!(task.data.status, TaskStatus::Added);
    assert!(task.data.file_cleaned.is_empty());
    assert_eq!(task.created_by, "alice");
}

#[tokio::test]
async fn proceed_without_ai_config_publishes_nothing() {
    let h = harness().await;
    let mut commands = h.exchange.subscribe("proceed_task");

    let file_id: Uid = "f1".into();
    let err = h
        .manager
        .proceed(&file_id, "datasets/f1.csv")
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Configuration(_));

    // No task was created and no command went out.
    assert!(h.manager.find_by_file_id(&file_id).await.unwrap().is_none());
    drop(h);
    assert!(commands.recv().await.is_none());
}

#[tokio::test]
async fn proceed_creates_task_and_publishes_command() {
    let h = harness().await;
    seed_settings(&h.store).await;
    let mut commands = h.exchange.subscribe("proceed_task");

    let file_id: Uid = "f1".into();
    let task = h.manager.proceed(&file_id, "datasets/f1.csv").await.unwrap();
    assert_eq!(task.data.status, TaskStatus::InQueue);

    match next_command(&mut commands).await {
        Command::Proceed {
            file_id: cmd_file,
            file_path,
            ..
        } => {
            assert_eq!(cmd_file, "f1");
            assert_eq!(file_path, "datasets/f1.csv");
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[tokio::test]
async fn proceed_on_existing_task_only_moves_status() {
    let h = harness().await;
    seed_settings(&h.store).await;
    let mut commands = h.exchange.subscribe("proceed_task");

    h.manager.create(task_data("f1"), "alice").await.unwrap();

    // The caller's path goes on the wire; the stored record keeps the
    // path it was registered with.
    let file_id: Uid = "f1".into();
    let task = h
        .manager
        .proceed(&file_id, "/elsewhere/f1.csv")
        .await
        .unwrap();
    assert_eq!(task.data.status, TaskStatus::InQueue);
    assert_eq!(task.data.file_path, "datasets/f1.csv");

    match next_command(&mut commands).await {
        Command::Proceed { file_path, .. } => assert_eq!(file_path, "/elsewhere/f1.csv"),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[tokio::test]
async fn repeated_proceed_republishes() {
    let h = harness().await;
    seed_settings(&h.store).await;
    let mut commands = h.exchange.subscribe("proceed_task");

    let file_id: Uid = "f1".into();
    h.manager.proceed(&file_id, "datasets/f1.csv").await.unwrap();
    h.manager.proceed(&file_id, "datasets/f1.csv").await.unwrap();

    // One task, two commands: duplicates are the worker's problem.
    assert_eq!(h.store.count("tasks").await, 1);
    next_command(&mut commands).await;
    next_command(&mut commands).await;
}

#[tokio::test]
async fn retry_and_process_signals_do_not_touch_the_store() {
    let h = harness().await;
    seed_settings(&h.store).await;
    let mut retries = h.exchange.subscribe("retry_step");
    let mut controls = h.exchange.subscribe("handle_process");

    let file_id: Uid = "f1".into();
    h.manager
        .retry_step(&file_id, "datasets/f1.csv", TaskStatus::ProcessCleaningDone)
        .await
        .unwrap();
    h.manager
        .handle_process(&file_id, ProcessSignal::Pause)
        .await
        .unwrap();

    assert_eq!(h.store.count("tasks").await, 0);

    assert_matches!(
        next_command(&mut retries).await,
        Command::RetryStep {
            last_event_step: TaskStatus::ProcessCleaningDone,
            ..
        }
    );
    assert_matches!(
        next_command(&mut controls).await,
        Command::HandleProcess {
            event: ProcessSignal::Pause,
            ..
        }
    );
}

#[tokio::test]
async fn full_run_then_restart_resets_record_and_disk() {
    let h = harness().await;
    seed_settings(&h.store).await;
    let file_id: Uid = "f1".into();

    h.manager.proceed(&file_id, "datasets/f1.csv").await.unwrap();
    let task = h.manager.find_by_file_id(&file_id).await.unwrap().unwrap();

    // Stand-in for the external worker: write artifacts to disk and
    // report completion through the store.
    for bucket in ["cleaned", "analysed"] {
        let dir = h.root.join(bucket);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("f1.csv"), "col\nval\n").unwrap();
    }
    h.manager
        .update(
            &task.uid,
            &TaskChanges {
                status: Some(TaskStatus::Done),
                file_cleaned: Some(ArtifactRef {
                    path: Some("/srv/other-root/cleaned/f1.csv".into()),
                    mime_type: Some("text/csv".into()),
                }),
                file_analysed: Some(ArtifactRef {
                    path: Some("/srv/other-root/analysed/f1.csv".into()),
                    mime_type: Some("text/csv".into()),
                }),
                ..Default::default()
            },
            "worker",
        )
        .await
        .unwrap();

    let restarted = h.manager.restart(&file_id).await.unwrap();
    assert_eq!(restarted.data.status, TaskStatus::Added);
    assert!(restarted.data.file_cleaned.is_empty());
    assert!(restarted.data.file_analysed.is_empty());

    // Foreign absolute paths were re-rooted and the files removed.
    assert!(!h.root.join("cleaned/f1.csv").exists());
    assert!(!h.root.join("analysed/f1.csv").exists());
}

#[tokio::test]
async fn restart_succeeds_when_artifacts_never_existed() {
    let h = harness().await;
    h.manager.create(task_data("f1"), "test").await.unwrap();

    // Nothing on disk; artifact removal is a no-op, not a failure.
    let restarted = h.manager.restart(&"f1".into()).await.unwrap();
    assert_eq!(restarted.data.status, TaskStatus::Added);
    assert!(restarted.data.file_cleaned.is_empty());
    assert!(restarted.data.file_analysed.is_empty());
}

#[tokio::test]
async fn restart_unknown_file_is_not_found() {
    let h = harness().await;
    let file_id: Uid = "missing".into();
    assert_matches!(
        h.manager.restart(&file_id).await.unwrap_err(),
        CoreError::NotFound { entity: "task", .. }
    );
}

#[tokio::test]
async fn delete_reports_true_exactly_once() {
    let h = harness().await;
    let task = h.manager.create(task_data("f1"), "test").await.unwrap();
    assert_eq!(task.data.file_id, "f1");

    let file_id: Uid = "f1".into();
    assert!(h.manager.delete_with_artifacts(&file_id).await.unwrap());
    assert!(!h.manager.delete_with_artifacts(&file_id).await.unwrap());

    let unknown: Uid = "never-existed".into();
    assert!(!h.manager.delete_with_artifacts(&unknown).await.unwrap());
}

#[tokio::test]
async fn update_bumps_audit_and_preserves_untouched_fields() {
    let h = harness().await;
    let task = h.manager.create(task_data("f1"), "alice").await.unwrap();

    let updated = h
        .manager
        .update(
            &task.uid,
            &TaskChanges {
                status: Some(TaskStatus::ReadingDataset),
                ..Default::default()
            },
            "worker",
        )
        .await
        .unwrap();

    assert_eq!(updated.data.status, TaskStatus::ReadingDataset);
    assert_eq!(updated.data.file_path, task.data.file_path);
    assert_eq!(updated.created_by, "alice");
    assert_eq!(updated.updated_by, "worker");
    assert!(updated.updated_at >= task.updated_at);
}

#[tokio::test]
async fn update_unknown_uid_is_not_found() {
    let h = harness().await;
    let uid: Uid = "no-such-task".into();
    assert_matches!(
        h.manager
            .update(&uid, &TaskChanges::default(), "worker")
            .await
            .unwrap_err(),
        CoreError::NotFound { .. }
    );
}

#[tokio::test]
async fn created_task_document_matches_wire_shape() {
    let h = harness().await;
    h.manager.create(task_data("f1"), "test").await.unwrap();

    let doc = h
        .store
        .find_one("tasks", &Task::by_file_id(&"f1".into()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc["data"]["status"], "added");
    assert!(doc["createdAt"].is_string());
    assert!(doc["updatedBy"].is_string());
}

/// Accepts writes but never finds them again, as a lagging or broken
/// backend would.
struct AmnesiacStore;

#[async_trait::async_trait]
impl DocumentStore for AmnesiacStore {
    async fn find_one(
        &self,
        _collection: &str,
        _filter: &Filter,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(None)
    }

    async fn find_many(
        &self,
        _collection: &str,
        _filter: &Filter,
        _options: &FindOptions,
    ) -> Result<Vec<serde_json::Value>, StoreError> {
        Ok(vec![])
    }

    async fn insert_one(
        &self,
        _collection: &str,
        document: serde_json::Value,
    ) -> Result<serde_json::Value, StoreError> {
        Ok(document)
    }

    async fn update_one(
        &self,
        _collection: &str,
        _filter: &Filter,
        _update: &Update,
    ) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn delete_one(&self, _collection: &str, _filter: &Filter) -> Result<bool, StoreError> {
        Ok(false)
    }
}

#[tokio::test]
async fn create_fails_when_insert_cannot_be_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let exchange = Arc::new(Exchange::new("tasks"));
    let publisher = TaskPublisher::new(Arc::new(Broker::local(exchange)));
    let manager = TaskLifecycleManager::new(
        Arc::new(AmnesiacStore),
        publisher,
        StorageSettings::with_root(dir.path()),
    );

    let err = manager.create(task_data("f1"), "test").await.unwrap_err();
    assert_matches!(err, CoreError::Consistency(_));
}
