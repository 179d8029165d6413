//! Store-authoritative task watching.
//!
//! A notification is only ever a wake-up call: on every status event
//! the watcher re-reads the task from the store and reports that
//! snapshot, so a stale or reordered delivery can never push a client
//! backwards. Progression events carry their own payload and bypass
//! the store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sentra_broker::{Broker, Delivery, Exchange, Notification, Progression};
use sentra_core::types::Uid;
use sentra_core::TaskStatus;
use sentra_store::collections::TASKS;
use sentra_store::models::Task;
use sentra_store::{DocumentStore, Filter, FindOptions};

use crate::reconnect::{reconnect_loop, ReconnectConfig};

/// What a watcher observes: one file's task, or every task.
#[derive(Debug, Clone)]
pub enum WatchTarget {
    File(Uid),
    All,
}

impl WatchTarget {
    /// The broker binding pattern for this target.
    pub fn pattern(&self) -> String {
        match self {
            Self::File(file_id) => format!("{file_id}.*"),
            Self::All => "#".to_string(),
        }
    }
}

/// Callbacks invoked by the watcher. Status callbacks always receive
/// the store snapshot, never the notification payload.
#[async_trait]
pub trait TaskEvents: Send + Sync {
    async fn on_status(&self, task: &Task);
    async fn on_progression(&self, file_id: &Uid, progression: &Progression);
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Store polling cadence while the broker is unreachable.
    pub poll_interval: Duration,
    pub reconnect: ReconnectConfig,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// A spawned watcher task.
///
/// Dropping the handle cancels the watcher; [`stop`](Self::stop) does
/// the same explicitly and may be called any number of times.
pub struct WatcherHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl WatcherHandle {
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stop and wait for the watcher task to finish.
    pub async fn join(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub struct TaskWatcher {
    broker: Arc<Broker>,
    store: Arc<dyn DocumentStore>,
    target: WatchTarget,
    handler: Arc<dyn TaskEvents>,
    config: WatcherConfig,
    cancel: CancellationToken,
}

impl TaskWatcher {
    pub fn spawn(
        broker: Arc<Broker>,
        store: Arc<dyn DocumentStore>,
        target: WatchTarget,
        handler: Arc<dyn TaskEvents>,
        config: WatcherConfig,
    ) -> WatcherHandle {
        let cancel = CancellationToken::new();
        let watcher = TaskWatcher {
            broker,
            store,
            target,
            handler,
            config,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(async move { watcher.run().await });
        WatcherHandle {
            cancel,
            task: Some(task),
        }
    }

    async fn run(self) {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            // Exactly one source is ever active: either the live
            // subscription, or the polling fallback while reconnecting.
            let channel = match self.broker.channel().await {
                Ok(channel) => channel.clone(),
                Err(e) => {
                    warn!(error = %e, "broker unavailable, polling the store instead");
                    match self.poll_until_connected().await {
                        Some(channel) => channel,
                        None => return,
                    }
                }
            };

            if !self.live_loop(channel).await {
                return;
            }
            // Subscription closed under us; try to re-establish.
        }
    }

    /// Poll the store on a fixed cadence while a backoff loop retries
    /// the broker. Returns the channel once connected, or `None` on
    /// cancellation. The poll is fully stopped before this returns.
    async fn poll_until_connected(&self) -> Option<Arc<Exchange>> {
        let poll_cancel = self.cancel.child_token();
        let poll = {
            let cancel = poll_cancel.clone();
            let store = self.store.clone();
            let target = self.target.clone();
            let handler = self.handler.clone();
            let interval = self.config.poll_interval;
            tokio::spawn(async move {
                poll_loop(store, target, handler, interval, cancel).await;
            })
        };

        let channel = reconnect_loop(&self.broker, &self.config.reconnect, &self.cancel).await;
        poll_cancel.cancel();
        let _ = poll.await;

        if channel.is_some() {
            info!("switching from store polling to live notifications");
        }
        channel
    }

    /// Consume live deliveries until cancelled (`false`) or the
    /// subscription closes (`true`).
    async fn live_loop(&self, channel: Arc<Exchange>) -> bool {
        let mut subscription = channel.subscribe(self.target.pattern());
        debug!(pattern = subscription.pattern(), "watching live notifications");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                delivery = subscription.recv() => match delivery {
                    Some(delivery) => self.handle_delivery(&delivery).await,
                    None => {
                        warn!("notification subscription closed");
                        return true;
                    }
                },
            }
        }
    }

    async fn handle_delivery(&self, delivery: &Delivery) {
        let Some(notification) = Notification::decode(delivery) else {
            debug!(routing_key = %delivery.routing_key, "ignoring undecodable notification");
            return;
        };

        // The binding pattern already scopes deliveries, but the
        // payload's file_id is the one that counts.
        if let WatchTarget::File(file_id) = &self.target {
            if &notification.file_id != file_id {
                debug!(
                    got = %notification.file_id,
                    want = %file_id,
                    "dropping notification for a different file"
                );
                return;
            }
        }

        if notification.is_progression() {
            self.handler
                .on_progression(&notification.file_id, &notification.progression)
                .await;
            return;
        }

        match self.read_task(&notification.file_id).await {
            Some(task) => self.handler.on_status(&task).await,
            None => debug!(file_id = %notification.file_id, "notification for unknown task"),
        }
    }

    async fn read_task(&self, file_id: &Uid) -> Option<Task> {
        match self.store.find_one(TASKS, &Task::by_file_id(file_id)).await {
            Ok(Some(doc)) => match Task::from_document(doc) {
                Ok(task) => Some(task),
                Err(e) => {
                    warn!(%file_id, error = %e, "stored task document is malformed");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(%file_id, error = %e, "store read failed");
                None
            }
        }
    }
}

/// Fixed-cadence store polling. The first observation of each task is
/// recorded silently; `on_status` fires on subsequent status changes.
async fn poll_loop(
    store: Arc<dyn DocumentStore>,
    target: WatchTarget,
    handler: Arc<dyn TaskEvents>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut seen: HashMap<Uid, TaskStatus> = HashMap::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let tasks = match snapshot(&*store, &target).await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(error = %e, "store poll failed");
                continue;
            }
        };

        for task in tasks {
            let status = task.data.status;
            match seen.insert(task.data.file_id.clone(), status) {
                Some(previous) if previous != status => handler.on_status(&task).await,
                _ => {}
            }
        }
    }
}

async fn snapshot(
    store: &dyn DocumentStore,
    target: &WatchTarget,
) -> Result<Vec<Task>, sentra_store::StoreError> {
    let docs = match target {
        WatchTarget::File(file_id) => store
            .find_one(TASKS, &Task::by_file_id(file_id))
            .await?
            .into_iter()
            .collect(),
        WatchTarget::All => {
            store
                .find_many(TASKS, &Filter::all(), &FindOptions::default())
                .await?
        }
    };
    docs.into_iter()
        .map(Task::from_document)
        .collect::<Result<_, _>>()
}
