use async_trait::async_trait;
use thiserror::Error;

use crate::models::{JobLogEntry, JobStatus};

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("bad response ({status}): {message}")]
    BadResponse { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("download failed: {0}")]
    DownloadFailed(String),
}

impl ApiError {
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => "No se pudo conectar con el servidor".to_string(),
            ApiError::BadResponse { status, message } if message.is_empty() => {
                format!("El servidor respondió con un error ({})", status)
            }
            ApiError::BadResponse { status, message } => {
                format!("El servidor respondió con un error ({}): {}", status, message)
            }
            ApiError::Parse(_) => "Respuesta inesperada del servidor".to_string(),
            ApiError::Unauthorized => "Sesión no autorizada".to_string(),
            ApiError::DownloadFailed(_) => "Error al descargar el archivo".to_string(),
        }
    }
}

/// The external job runner behind the `update/*` endpoints.
///
/// Job state lives entirely on the other side of this trait.
#[async_trait]
pub trait UpdateApi: Send + Sync {
    /// Ask the runner to begin a dataset update. Returns as soon as accepted.
    async fn start(&self) -> Result<(), ApiError>;

    async fn status(&self) -> Result<JobStatus, ApiError>;

    /// Best-effort cancellation, no synchronous confirmation.
    async fn cancel(&self) -> Result<(), ApiError>;

    /// Finished runs, most recent first.
    async fn logs(&self) -> Result<Vec<JobLogEntry>, ApiError>;

    async fn download_log(&self, filename: &str) -> Result<Vec<u8>, ApiError>;
}
