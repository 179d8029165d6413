//! Task status state machine.
//!
//! The pipeline is linear: each processing stage has an in-progress node
//! and a `-done` node, bracketed by `added`/`in_queue` on the near side
//! and `done` on the far side. `on_error`, `paused`, and `stopped` are
//! reachable from any in-flight stage; only the external worker moves a
//! task out of `paused`/`stopped`.
//!
//! Only `added` and `in_queue` are ever written by this core. Everything
//! past `in_queue` is a foreign write performed by the worker directly
//! against the store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved notification event name for LLM batch progression.
///
/// This is a side-channel signal, not a status: it may arrive while the
/// stored status is `sending_to_llm` and never overwrites it.
pub const PROGRESSION_EVENT: &str = "sending_to_llm_progression";

/// A node of the task pipeline DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Added,
    InQueue,
    ReadingDataset,
    ReadingDatasetDone,
    ProcessCleaning,
    ProcessCleaningDone,
    SendingToLlm,
    SendingToLlmDone,
    AppendingColumns,
    AppendingColumnsDone,
    SavingFile,
    SavingFileDone,
    Done,
    OnError,
    Paused,
    Stopped,
}

/// The linear pipeline in execution order. Terminal/suspend states are
/// not stages and do not appear here.
pub const PIPELINE: &[TaskStatus] = &[
    TaskStatus::Added,
    TaskStatus::InQueue,
    TaskStatus::ReadingDataset,
    TaskStatus::ReadingDatasetDone,
    TaskStatus::ProcessCleaning,
    TaskStatus::ProcessCleaningDone,
    TaskStatus::SendingToLlm,
    TaskStatus::SendingToLlmDone,
    TaskStatus::AppendingColumns,
    TaskStatus::AppendingColumnsDone,
    TaskStatus::SavingFile,
    TaskStatus::SavingFileDone,
    TaskStatus::Done,
];

impl TaskStatus {
    /// Wire name (snake_case), used in routing keys and stored documents.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::InQueue => "in_queue",
            Self::ReadingDataset => "reading_dataset",
            Self::ReadingDatasetDone => "reading_dataset_done",
            Self::ProcessCleaning => "process_cleaning",
            Self::ProcessCleaningDone => "process_cleaning_done",
            Self::SendingToLlm => "sending_to_llm",
            Self::SendingToLlmDone => "sending_to_llm_done",
            Self::AppendingColumns => "appending_columns",
            Self::AppendingColumnsDone => "appending_columns_done",
            Self::SavingFile => "saving_file",
            Self::SavingFileDone => "saving_file_done",
            Self::Done => "done",
            Self::OnError => "on_error",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        }
    }

    /// Parse a wire name back into a status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "added" => Some(Self::Added),
            "in_queue" => Some(Self::InQueue),
            "reading_dataset" => Some(Self::ReadingDataset),
            "reading_dataset_done" => Some(Self::ReadingDatasetDone),
            "process_cleaning" => Some(Self::ProcessCleaning),
            "process_cleaning_done" => Some(Self::ProcessCleaningDone),
            "sending_to_llm" => Some(Self::SendingToLlm),
            "sending_to_llm_done" => Some(Self::SendingToLlmDone),
            "appending_columns" => Some(Self::AppendingColumns),
            "appending_columns_done" => Some(Self::AppendingColumnsDone),
            "saving_file" => Some(Self::SavingFile),
            "saving_file_done" => Some(Self::SavingFileDone),
            "done" => Some(Self::Done),
            "on_error" => Some(Self::OnError),
            "paused" => Some(Self::Paused),
            "stopped" => Some(Self::Stopped),
            _ => None,
        }
    }

    /// Position within [`PIPELINE`], or `None` for terminal/suspend states.
    pub fn stage_index(self) -> Option<usize> {
        PIPELINE.iter().position(|s| *s == self)
    }

    /// `done` and `on_error` — nothing will ever advance this task again
    /// without an explicit restart/retry.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::OnError)
    }

    /// `paused`/`stopped` — resumable, but only by the external worker.
    pub fn is_suspended(self) -> bool {
        matches!(self, Self::Paused | Self::Stopped)
    }

    /// A pipeline stage strictly between `added` and `done`.
    pub fn is_in_flight(self) -> bool {
        match self.stage_index() {
            Some(i) => i > 0 && i < PIPELINE.len() - 1,
            None => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process control signal carried by a `handle_process` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessSignal {
    Pause,
    Resume,
    Stop,
}

impl ProcessSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for ProcessSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
