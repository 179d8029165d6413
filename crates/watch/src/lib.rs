//! Live task watching with a store-polling fallback.
//!
//! The broker channel is an optimization, not a source of truth: every
//! status notification triggers a re-read of the task record, and when
//! the broker cannot be reached at all, the watcher degrades to polling
//! the store until a backoff loop re-establishes the channel.

pub mod reconnect;
pub mod watcher;

pub use reconnect::ReconnectConfig;
pub use watcher::{TaskEvents, TaskWatcher, WatchTarget, WatcherConfig, WatcherHandle};
