use std::time::Duration;

use crate::errors::TrackerError;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl TrackerConfig {
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var("DATASET_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            api_token: std::env::var("DATASET_API_TOKEN").ok(),
            poll_interval: Duration::from_secs(
                std::env::var("DATASET_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            request_timeout: Duration::from_secs(
                std::env::var("DATASET_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
        }
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        let url = url::Url::parse(&self.api_url)
            .map_err(|e| TrackerError::Config(format!("DATASET_API_URL is not a valid url: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TrackerError::Config(format!(
                "DATASET_API_URL must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(TrackerError::Config("DATASET_POLL_INTERVAL_SECS must be at least 1".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(TrackerError::Config("DATASET_REQUEST_TIMEOUT_SECS must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TrackerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_url = TrackerConfig { api_url: "not a url".into(), ..TrackerConfig::default() };
        assert!(matches!(bad_url.validate(), Err(TrackerError::Config(_))));

        let bad_scheme = TrackerConfig { api_url: "ftp://host/".into(), ..TrackerConfig::default() };
        assert!(matches!(bad_scheme.validate(), Err(TrackerError::Config(_))));

        let zero_interval = TrackerConfig { poll_interval: Duration::ZERO, ..TrackerConfig::default() };
        assert!(matches!(zero_interval.validate(), Err(TrackerError::Config(_))));
    }
}
