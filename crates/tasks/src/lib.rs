//! Task lifecycle orchestration.
//!
//! [`TaskLifecycleManager`] owns every state transition the application
//! layer is allowed to make: creating a task, queueing it for the
//! external worker, relaying pause/resume/stop signals, restarting, and
//! deleting. It deliberately does **not** write pipeline progress — the
//! worker is the sole emitter of in-flight statuses, and this crate only
//! ever observes them through the store.

pub mod artifacts;
pub mod manager;

pub use manager::{TaskChanges, TaskLifecycleManager};
