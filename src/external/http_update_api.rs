use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;

use crate::external::client::ApiClient;
use crate::external::update_api::{ApiError, UpdateApi};
use crate::models::{JobLogEntry, JobStatus};

/// `UpdateApi` over the backend's `update/*` HTTP endpoints.
pub struct HttpUpdateApi {
    client: ApiClient,
}

impl HttpUpdateApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UpdateApi for HttpUpdateApi {
    async fn start(&self) -> Result<(), ApiError> {
        let req = self.client.request(Method::POST, "update")?;
        self.client.send(req).await?;
        Ok(())
    }

    async fn status(&self) -> Result<JobStatus, ApiError> {
        let req = self.client.request(Method::GET, "update/status")?;
        let resp = self.client.send(req).await?;

        let status: JobStatus = resp
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        debug!(
            "update status: running={} lines={} elapsed={}s",
            status.running,
            status.progress.len(),
            status.elapsed_seconds
        );
        Ok(status)
    }

    async fn cancel(&self) -> Result<(), ApiError> {
        let req = self.client.request(Method::POST, "update/cancel")?;
        self.client.send(req).await?;
        Ok(())
    }

    async fn logs(&self) -> Result<Vec<JobLogEntry>, ApiError> {
        let req = self.client.request(Method::GET, "update/logs")?;
        let resp = self.client.send(req).await?;

        resp.json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }

    async fn download_log(&self, filename: &str) -> Result<Vec<u8>, ApiError> {
        let url = self.client.segments_url(&["update", "logs", filename])?;
        let req = self.client.request_url(Method::GET, url);

        // Any non-2xx, auth included, is a plain download failure here.
        let resp = match self.client.send(req).await {
            Ok(resp) => resp,
            Err(ApiError::Network(msg)) => return Err(ApiError::Network(msg)),
            Err(e) => return Err(ApiError::DownloadFailed(e.to_string())),
        };

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ApiError::DownloadFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
