//! Wire messages: control commands and status notifications.
//!
//! Neither kind is ever persisted. Commands are directives to the
//! external worker; notifications are best-effort hints that a status
//! changed — the store stays authoritative.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sentra_core::status::PROGRESSION_EVENT;
use sentra_core::types::Uid;
use sentra_core::{ProcessSignal, TaskStatus};
use sentra_store::models::AiConfig;

use crate::connection::BrokerError;
use crate::exchange::Delivery;

/// Fixed command routing keys. Commands are deliberately **not**
/// per-file addressable: one consumer queue serves all files and
/// filters on the in-payload `file_id`.
pub const KEY_PROCEED_TASK: &str = "proceed_task";
pub const KEY_RETRY_STEP: &str = "retry_step";
pub const KEY_HANDLE_PROCESS: &str = "handle_process";

/// All command keys, for binding a worker-side subscription.
pub const COMMAND_KEYS: &[&str] = &[KEY_PROCEED_TASK, KEY_RETRY_STEP, KEY_HANDLE_PROCESS];

/// A control command directed at the external worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    Proceed {
        file_id: Uid,
        file_path: String,
        ai: AiConfig,
    },
    RetryStep {
        file_id: Uid,
        file_path: String,
        last_event_step: TaskStatus,
        ai: AiConfig,
    },
    HandleProcess {
        file_id: Uid,
        event: ProcessSignal,
    },
}

impl Command {
    pub fn routing_key(&self) -> &'static str {
        match self {
            Self::Proceed { .. } => KEY_PROCEED_TASK,
            Self::RetryStep { .. } => KEY_RETRY_STEP,
            Self::HandleProcess { .. } => KEY_HANDLE_PROCESS,
        }
    }

    pub fn file_id(&self) -> &Uid {
        match self {
            Self::Proceed { file_id, .. }
            | Self::RetryStep { file_id, .. }
            | Self::HandleProcess { file_id, .. } => file_id,
        }
    }

    pub fn payload(&self) -> Result<Value, BrokerError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode a delivery received on one of the fixed command keys.
    /// The routing key disambiguates the variants.
    pub fn decode(delivery: &Delivery) -> Option<Self> {
        let payload = delivery.payload.clone();
        match delivery.routing_key.as_str() {
            KEY_PROCEED_TASK => {
                let inner: ProceedPayload = serde_json::from_value(payload).ok()?;
                Some(Self::Proceed {
                    file_id: inner.file_id,
                    file_path: inner.file_path,
                    ai: inner.ai,
                })
            }
            KEY_RETRY_STEP => {
                let inner: RetryPayload = serde_json::from_value(payload).ok()?;
                Some(Self::RetryStep {
                    file_id: inner.file_id,
                    file_path: inner.file_path,
                    last_event_step: inner.last_event_step,
                    ai: inner.ai,
                })
            }
            KEY_HANDLE_PROCESS => {
                let inner: HandlePayload = serde_json::from_value(payload).ok()?;
                Some(Self::HandleProcess {
                    file_id: inner.file_id,
                    event: inner.event,
                })
            }
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct ProceedPayload {
    file_id: Uid,
    file_path: String,
    ai: AiConfig,
}

#[derive(Deserialize)]
struct RetryPayload {
    file_id: Uid,
    file_path: String,
    last_event_step: TaskStatus,
    ai: AiConfig,
}

#[derive(Deserialize)]
struct HandlePayload {
    file_id: Uid,
    event: ProcessSignal,
}

/// Optional progression counters piggybacked on the reserved
/// `sending_to_llm_progression` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Progression {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_batches: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_rows: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_processed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_remaining: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_row_index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_row_end: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_used: Option<bool>,
}

/// A best-effort status (or progression) notification.
///
/// Routing key: `{file_id}.{event}`, so that a subscriber can filter to
/// one file with the broker-side pattern `{file_id}.*`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub file_id: Uid,
    pub event: String,
    #[serde(flatten)]
    pub progression: Progression,
}

impl Notification {
    pub fn status(file_id: impl Into<Uid>, status: TaskStatus) -> Self {
        Self {
            file_id: file_id.into(),
            event: status.as_str().to_string(),
            progression: Progression::default(),
        }
    }

    pub fn progression(file_id: impl Into<Uid>, progression: Progression) -> Self {
        Self {
            file_id: file_id.into(),
            event: PROGRESSION_EVENT.to_string(),
            progression,
        }
    }

    pub fn is_progression(&self) -> bool {
        self.event == PROGRESSION_EVENT
    }

    pub fn routing_key(&self) -> String {
        format!("{}.{}", self.file_id, self.event)
    }

    pub fn payload(&self) -> Result<Value, BrokerError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn decode(delivery: &Delivery) -> Option<Self> {
        serde_json::from_value(delivery.payload.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentra_store::models::{AiMode, AiPreferences};

    fn ai() -> AiConfig {
        AiConfig {
            preferences: AiPreferences {
                mode: AiMode::Automatic,
                default_local_model_id: None,
                default_external_model_id: None,
            },
            local: vec![],
            external: vec![],
        }
    }

    #[test]
    fn command_routing_keys_are_fixed() {
        let proceed = Command::Proceed {
            file_id: "f1".into(),
            file_path: "p".into(),
            ai: ai(),
        };
        let retry = Command::RetryStep {
            file_id: "f1".into(),
            file_path: "p".into(),
            last_event_step: TaskStatus::ProcessCleaningDone,
            ai: ai(),
        };
        let control = Command::HandleProcess {
            file_id: "f1".into(),
            event: ProcessSignal::Pause,
        };

        // Never per-file: the key does not depend on the target file.
        assert_eq!(proceed.routing_key(), "proceed_task");
        assert_eq!(retry.routing_key(), "retry_step");
        assert_eq!(control.routing_key(), "handle_process");
    }

    #[test]
    fn command_payload_carries_file_id() {
        let cmd = Command::HandleProcess {
            file_id: "f1".into(),
            event: ProcessSignal::Stop,
        };
        let payload = cmd.payload().unwrap();
        assert_eq!(payload["file_id"], "f1");
        assert_eq!(payload["event"], "stop");
    }

    #[test]
    fn command_decode_round_trip() {
        let cmd = Command::RetryStep {
            file_id: "f7".into(),
            file_path: "/data/f7.csv".into(),
            last_event_step: TaskStatus::SendingToLlmDone,
            ai: ai(),
        };
        let delivery = Delivery {
            routing_key: cmd.routing_key().to_string(),
            payload: cmd.payload().unwrap(),
        };
        match Command::decode(&delivery) {
            Some(Command::RetryStep {
                file_id,
                last_event_step,
                ..
            }) => {
                assert_eq!(file_id, "f7");
                assert_eq!(last_event_step, TaskStatus::SendingToLlmDone);
            }
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn notification_routing_key_is_per_file() {
        let n = Notification::status("abc123", TaskStatus::Done);
        assert_eq!(n.routing_key(), "abc123.done");
        assert!(!n.is_progression());
    }

    #[test]
    fn progression_notification_flattens_counters() {
        let n = Notification::progression(
            "abc123",
            Progression {
                batch: Some(2),
                total_batches: Some(10),
                rows_processed: Some(1000),
                progress_percentage: Some(20.0),
                ..Default::default()
            },
        );
        assert_eq!(n.routing_key(), "abc123.sending_to_llm_progression");

        let payload = n.payload().unwrap();
        assert_eq!(payload["batch"], 2);
        assert_eq!(payload["total_batches"], 10);
        // Unset counters are omitted from the wire.
        assert!(payload.get("batch_size").is_none());

        let back = Notification::decode(&Delivery {
            routing_key: n.routing_key(),
            payload,
        })
        .unwrap();
        assert!(back.is_progression());
        assert_eq!(back.progression.batch, Some(2));
    }

    #[test]
    fn status_notification_carries_no_progression() {
        let n = Notification::status("f1", TaskStatus::InQueue);
        let payload = n.payload().unwrap();
        assert_eq!(payload["event"], "in_queue");
        assert_eq!(payload.as_object().unwrap().len(), 2); // file_id + event
    }
}
