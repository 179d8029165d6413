//! Stand-in for the external processing worker.
//!
//! Consumes the fixed-key command subscriptions, walks the pipeline
//! stage list writing each status straight to the store, and emits
//! best-effort notifications along the way, including batch progression
//! during the model stage. Pause/resume/stop signals are honored at
//! stage boundaries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sentra_broker::{
    Broker, Command, Notification, OnFailure, Progression, TaskPublisher, COMMAND_KEYS,
};
use sentra_core::config::StorageSettings;
use sentra_core::paths::{canonical_path, Bucket};
use sentra_core::status::PIPELINE;
use sentra_core::types::Uid;
use sentra_core::{CoreError, ProcessSignal, TaskStatus};
use sentra_store::models::ArtifactRef;
use sentra_tasks::{TaskChanges, TaskLifecycleManager};

const WORKER_ACTOR: &str = "worker-sim";
const LLM_BATCHES: u32 = 4;

/// Latest control signal per file, written by `handle_process` commands
/// and read by running pipelines at stage boundaries.
type Signals = Arc<Mutex<HashMap<Uid, ProcessSignal>>>;

pub struct WorkerSim {
    manager: TaskLifecycleManager,
    publisher: TaskPublisher,
    storage: StorageSettings,
    /// Wall time spent per stage, shortened for demos.
    pub stage_delay: Duration,
    signals: Signals,
}

impl WorkerSim {
    pub fn new(
        manager: TaskLifecycleManager,
        publisher: TaskPublisher,
        storage: StorageSettings,
    ) -> Self {
        Self {
            manager,
            publisher,
            storage,
            stage_delay: Duration::from_millis(100),
            signals: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run the command consumer until cancelled.
    pub async fn run(self: Arc<Self>, broker: Arc<Broker>, cancel: CancellationToken) {
        let channel = match broker.channel().await {
            Ok(channel) => channel.clone(),
            Err(e) => {
                warn!(error = %e, "worker cannot reach the broker, exiting");
                return;
            }
        };

        let mut subscriptions: Vec<_> = COMMAND_KEYS
            .iter()
            .map(|key| channel.subscribe(*key))
            .collect();
        info!("worker consuming commands");

        loop {
            let (delivery, _, _) = {
                let recvs = subscriptions
                    .iter_mut()
                    .map(|sub| Box::pin(sub.recv()))
                    .collect::<Vec<_>>();
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    result = futures::future::select_all(recvs) => result,
                }
            };
            let Some(delivery) = delivery else {
                info!("command subscription closed, worker exiting");
                return;
            };
            let Some(command) = Command::decode(&delivery) else {
                debug!(routing_key = %delivery.routing_key, "ignoring undecodable command");
                continue;
            };
            self.clone().dispatch(command, cancel.clone());
        }
    }

    fn dispatch(self: Arc<Self>, command: Command, cancel: CancellationToken) {
        tokio::spawn(async move {
            let file_id = command.file_id().clone();
            let result = match command {
                Command::Proceed { file_id, .. } => {
                    // Everything after `in_queue`.
                    self.run_pipeline(&file_id, 2, &cancel).await
                }
                Command::RetryStep {
                    file_id,
                    last_event_step,
                    ..
                } => {
                    let from = last_event_step.stage_index().map(|i| i + 1).unwrap_or(2);
                    self.run_pipeline(&file_id, from, &cancel).await
                }
                Command::HandleProcess { file_id, event } => {
                    self.signals.lock().await.insert(file_id, event);
                    Ok(())
                }
            };
            if let Err(e) = result {
                warn!(%file_id, error = %e, "pipeline run failed");
                self.write_status(&file_id, TaskStatus::OnError).await;
            }
        });
    }

    async fn run_pipeline(
        &self,
        file_id: &Uid,
        from_stage: usize,
        cancel: &CancellationToken,
    ) -> Result<(), CoreError> {
        for &status in PIPELINE.iter().skip(from_stage) {
            if cancel.is_cancelled() {
                return Ok(());
            }
            match self.await_clearance(file_id, cancel).await {
                Clearance::Proceed => {}
                Clearance::Abort => return Ok(()),
            }

            tokio::time::sleep(self.stage_delay).await;

            if status == TaskStatus::SendingToLlm {
                self.write_status(file_id, status).await;
                self.emit_progression(file_id).await;
                continue;
            }

            match status {
                TaskStatus::ProcessCleaningDone => {
                    let artifact = self.write_artifact(file_id, Bucket::Cleaned).await?;
                    self.finish_stage(file_id, status, Some((true, artifact))).await;
                }
                TaskStatus::SavingFileDone => {
                    let artifact = self.write_artifact(file_id, Bucket::Analysed).await?;
                    self.finish_stage(file_id, status, Some((false, artifact))).await;
                }
                _ => self.finish_stage(file_id, status, None).await,
            }
        }
        info!(%file_id, "pipeline complete");
        Ok(())
    }

    /// Check for a pending pause/stop between stages. A paused file
    /// waits for resume or stop; `Abort` ends the run.
    async fn await_clearance(&self, file_id: &Uid, cancel: &CancellationToken) -> Clearance {
        loop {
            let signal = self.signals.lock().await.remove(file_id);
            match signal {
                None | Some(ProcessSignal::Resume) => return Clearance::Proceed,
                Some(ProcessSignal::Stop) => {
                    self.write_status(file_id, TaskStatus::Stopped).await;
                    return Clearance::Abort;
                }
                Some(ProcessSignal::Pause) => {
                    self.write_status(file_id, TaskStatus::Paused).await;
                    loop {
                        if cancel.is_cancelled() {
                            return Clearance::Abort;
                        }
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        match self.signals.lock().await.remove(file_id) {
                            Some(ProcessSignal::Resume) => return Clearance::Proceed,
                            Some(ProcessSignal::Stop) => {
                                self.write_status(file_id, TaskStatus::Stopped).await;
                                return Clearance::Abort;
                            }
                            Some(ProcessSignal::Pause) | None => {}
                        }
                    }
                }
            }
        }
    }

    async fn finish_stage(
        &self,
        file_id: &Uid,
        status: TaskStatus,
        artifact: Option<(bool, ArtifactRef)>,
    ) {
        let mut changes = TaskChanges {
            status: Some(status),
            ..Default::default()
        };
        if let Some((cleaned, artifact)) = artifact {
            if cleaned {
                changes.file_cleaned = Some(artifact);
            } else {
                changes.file_analysed = Some(artifact);
            }
        }
        self.apply(file_id, changes).await;
        self.publisher
            .announce(&Notification::status(file_id.clone(), status), OnFailure::Swallow)
            .await
            .ok();
    }

    async fn write_status(&self, file_id: &Uid, status: TaskStatus) {
        self.apply(
            file_id,
            TaskChanges {
                status: Some(status),
                ..Default::default()
            },
        )
        .await;
        self.publisher
            .announce(&Notification::status(file_id.clone(), status), OnFailure::Swallow)
            .await
            .ok();
    }

    async fn apply(&self, file_id: &Uid, changes: TaskChanges) {
        let task = match self.manager.find_by_file_id(file_id).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                warn!(%file_id, "no task record for pipeline write");
                return;
            }
            Err(e) => {
                warn!(%file_id, error = %e, "store read failed");
                return;
            }
        };
        if let Err(e) = self.manager.update(&task.uid, &changes, WORKER_ACTOR).await {
            warn!(%file_id, error = %e, "store write failed");
        }
    }

    async fn emit_progression(&self, file_id: &Uid) {
        for batch in 1..=LLM_BATCHES {
            tokio::time::sleep(self.stage_delay / LLM_BATCHES).await;
            let progression = Progression {
                batch: Some(batch),
                total_batches: Some(LLM_BATCHES),
                batch_size: Some(25),
                total_rows: Some(100),
                rows_processed: Some(u64::from(batch) * 25),
                rows_remaining: Some(u64::from(LLM_BATCHES - batch) * 25),
                progress_percentage: Some(f64::from(batch) * 100.0 / f64::from(LLM_BATCHES)),
                ..Default::default()
            };
            self.publisher
                .announce(
                    &Notification::progression(file_id.clone(), progression),
                    OnFailure::Swallow,
                )
                .await
                .ok();
        }
    }

    /// Write a small derived CSV at the canonical location and return
    /// its artifact reference.
    async fn write_artifact(
        &self,
        file_id: &Uid,
        bucket: Bucket,
    ) -> Result<ArtifactRef, CoreError> {
        let path = canonical_path(&self.storage, file_id, bucket);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| CoreError::Filesystem {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&path, b"column,value\nexample,1\n")
            .await
            .map_err(|source| CoreError::Filesystem {
                path: path.clone(),
                source,
            })?;
        Ok(ArtifactRef {
            path: Some(path.to_string_lossy().into_owned()),
            mime_type: Some("text/csv".to_string()),
        })
    }
}

enum Clearance {
    Proceed,
    Abort,
}
