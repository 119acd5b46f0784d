use std::sync::Arc;

use crate::config::TrackerConfig;
use crate::errors::TrackerError;
use crate::external::client::ApiClient;
use crate::external::data_api::DataApi;
use crate::external::http_update_api::HttpUpdateApi;
use crate::external::update_api::UpdateApi;
use crate::services::job_controller::JobController;

#[derive(Clone)]
pub struct AppState {
    pub config: TrackerConfig,
    pub jobs: Arc<JobController>,
    pub data: DataApi,
}

impl AppState {
    pub fn from_config(config: TrackerConfig) -> Result<Self, TrackerError> {
        config.validate()?;

        let client = ApiClient::from_config(&config)?;
        let update_api: Arc<dyn UpdateApi> = Arc::new(HttpUpdateApi::new(client.clone()));

        Ok(Self {
            jobs: Arc::new(JobController::new(update_api, config.poll_interval)),
            data: DataApi::new(client),
            config,
        })
    }
}
