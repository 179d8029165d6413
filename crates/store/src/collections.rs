//! Collection names used by the pipeline core.

pub const FILES: &str = "files";
pub const TASKS: &str = "tasks";
pub const SETTINGS: &str = "settings";
