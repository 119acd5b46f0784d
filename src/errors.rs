use thiserror::Error;

use crate::external::update_api::ApiError;
use crate::services::derived_table::TableError;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("An update is already running")]
    AlreadyRunning,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Table error: {0}")]
    Table(#[from] TableError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl TrackerError {
    /// Message suitable for showing inline next to the action that failed.
    pub fn user_message(&self) -> String {
        match self {
            TrackerError::Api(api) => api.user_message(),
            other => other.to_string(),
        }
    }
}
