#![forbid(unsafe_code)]

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskdeckError {
    #[error("due dates cannot be in the past ({0})")]
    PastDueDate(time::Date),

    #[error("invalid {field}: {msg}")]
    InvalidInput { field: &'static str, msg: String },

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid config key '{0}'")]
    InvalidConfigKey(String),

    #[error("invalid config value for '{key}': {msg}")]
    InvalidConfigValue { key: String, msg: String },

    #[error("io error at {path}: {source}")]
    IoPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl TaskdeckError {
    /// Errors the user can fix by changing their input.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::PastDueDate(_) | Self::InvalidInput { .. })
    }
}
