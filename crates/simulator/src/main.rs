//! End-to-end demo: upload a dataset, queue it, watch the stand-in
//! worker walk the pipeline, then restart the task.
//!
//! Everything runs in one process: memory store, local exchange, the
//! lifecycle manager, a dashboard watcher, and the worker simulation.

mod worker;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sentra_broker::{Broker, Exchange, Progression, TaskPublisher};
use sentra_core::config::{BrokerSettings, StorageSettings};
use sentra_core::paths::{canonical_path, Bucket};
use sentra_core::types::{Uid, SYSTEM_ACTOR};
use sentra_core::TaskStatus;
use sentra_store::collections::{FILES, SETTINGS};
use sentra_store::models::{
    AiConfig, AiMode, AiModel, AiModelData, AiPreferences, FileData, FileRecord, Settings,
    SettingsData, Task, TaskData,
};
use sentra_store::{DocumentStore, MemoryStore};
use sentra_tasks::TaskLifecycleManager;
use sentra_watch::{TaskEvents, TaskWatcher, WatchTarget, WatcherConfig};

use worker::WorkerSim;

/// Dashboard stand-in: log whatever the watcher reports.
struct LogEvents;

#[async_trait]
impl TaskEvents for LogEvents {
    async fn on_status(&self, task: &Task) {
        info!(
            file_id = %task.data.file_id,
            status = %task.data.status,
            "status update"
        );
    }

    async fn on_progression(&self, file_id: &Uid, progression: &Progression) {
        info!(
            %file_id,
            batch = progression.batch,
            total_batches = progression.total_batches,
            percent = progression.progress_percentage,
            "model progression"
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentra=info,sentra_simulator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let storage = StorageSettings::with_root(
        std::env::temp_dir().join(format!("sentra-sim-{}", std::process::id())),
    );
    info!(root = %storage.root().display(), "storage root");

    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let exchange = Arc::new(Exchange::new(BrokerSettings::from_env().exchange));
    let broker = Arc::new(Broker::local(exchange));
    let publisher = TaskPublisher::new(broker.clone());
    let manager = TaskLifecycleManager::new(store.clone(), publisher.clone(), storage.clone());

    seed_settings(store.as_ref()).await?;

    let cancel = CancellationToken::new();
    let sim = Arc::new(WorkerSim::new(
        manager.clone(),
        publisher.clone(),
        storage.clone(),
    ));
    let worker_task = tokio::spawn(sim.run(broker.clone(), cancel.clone()));

    let watcher = TaskWatcher::spawn(
        broker.clone(),
        store.clone(),
        WatchTarget::All,
        Arc::new(LogEvents),
        WatcherConfig::default(),
    );

    // "Upload": write the dataset and register its file and task.
    let file_id = upload_dataset(store.as_ref(), &manager, &storage).await?;
    let file_path = canonical_path(&storage, &file_id, Bucket::Datasets)
        .to_string_lossy()
        .into_owned();

    info!(%file_id, "queueing dataset");
    manager.proceed(&file_id, &file_path).await?;
    wait_for_status(&manager, &file_id, TaskStatus::Done).await?;
    info!(%file_id, "pipeline finished, restarting");

    let restarted = manager.restart(&file_id).await?;
    info!(
        %file_id,
        status = %restarted.data.status,
        "task reset, derived artifacts removed"
    );

    cancel.cancel();
    watcher.join().await;
    let _ = worker_task.await;
    Ok(())
}

async fn seed_settings(store: &MemoryStore) -> anyhow::Result<()> {
    let model = AiModel {
        uid: "local-default".into(),
        data: AiModelData {
            model: "llama3".into(),
            base_url: "http://localhost:11434".into(),
            api_key: "ollama".into(),
            retry_requests: 3,
            paginate_rows_limit: 25,
        },
    };
    let settings = Settings::new(
        SettingsData {
            ai: Some(AiConfig {
                preferences: AiPreferences {
                    mode: AiMode::Local,
                    default_local_model_id: Some(model.uid.clone()),
                    default_external_model_id: None,
                },
                local: vec![model],
                external: vec![],
            }),
        },
        SYSTEM_ACTOR,
    );
    store.insert_one(SETTINGS, settings.to_document()?).await?;
    Ok(())
}

async fn upload_dataset(
    store: &MemoryStore,
    manager: &TaskLifecycleManager,
    storage: &StorageSettings,
) -> anyhow::Result<Uid> {
    let record = FileRecord::new(
        FileData {
            filename: "cities.csv".into(),
            size: 64,
            file_path: String::new(),
            extension: "csv".into(),
            mime_type: "text/csv".into(),
        },
        "demo",
    );
    let file_id = record.uid.clone();

    let dataset = canonical_path(storage, &file_id, Bucket::Datasets);
    if let Some(parent) = dataset.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&dataset, b"city,country\nNantes,France\nTurin,Italy\n").await?;

    let mut record = record;
    record.data.file_path = dataset.to_string_lossy().into_owned();
    store.insert_one(FILES, record.to_document()?).await?;

    manager
        .create(
            TaskData {
                file_id: file_id.clone(),
                file_path: record.data.file_path.clone(),
                status: TaskStatus::Added,
                file_cleaned: Default::default(),
                file_analysed: Default::default(),
            },
            "demo",
        )
        .await?;

    info!(%file_id, "dataset uploaded");
    Ok(file_id)
}

async fn wait_for_status(
    manager: &TaskLifecycleManager,
    file_id: &Uid,
    wanted: TaskStatus,
) -> anyhow::Result<()> {
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            if let Some(task) = manager.find_by_file_id(file_id).await? {
                if task.data.status == wanted {
                    return anyhow::Ok(());
                }
                if task.data.status == TaskStatus::OnError {
                    anyhow::bail!("pipeline ended in error");
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .context("timed out waiting for pipeline completion")?
}
