use chrono::NaiveDate;
use regex::Regex;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::Method;
use tracing::info;

use crate::errors::TrackerError;
use crate::external::client::ApiClient;
use crate::external::update_api::ApiError;
use crate::models::Series;

pub const DEFAULT_EXPORT_FILENAME: &str = "export.xlsx";

/// Selection sent to the generic data-query endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesQuery {
    pub ids: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SeriesQuery {
    pub fn new(ids: Vec<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self { ids, start, end }
    }

    /// Checked before any request is built.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.ids.is_empty() {
            return Err(TrackerError::Validation("Seleccione al menos un elemento".into()));
        }
        if self.ids.iter().any(|id| id.trim().is_empty()) {
            return Err(TrackerError::Validation("Identificador vacío en la selección".into()));
        }
        if self.start > self.end {
            return Err(TrackerError::Validation(format!(
                "La fecha inicial {} es posterior a la fecha final {}",
                self.start, self.end
            )));
        }
        Ok(())
    }

    fn params(&self) -> [(&'static str, String); 3] {
        [
            ("ids", self.ids.iter().map(|id| id.trim()).collect::<Vec<_>>().join(",")),
            ("start_date", self.start.format("%Y-%m-%d").to_string()),
            ("end_date", self.end.format("%Y-%m-%d").to_string()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Read side of the dashboards: series queries and spreadsheet exports.
#[derive(Debug, Clone)]
pub struct DataApi {
    client: ApiClient,
}

impl DataApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// An empty array for the range is a valid, empty answer.
    pub async fn fetch_series(&self, endpoint: &str, query: &SeriesQuery) -> Result<Vec<Series>, TrackerError> {
        query.validate()?;

        let req = self
            .client
            .request(Method::GET, endpoint)?
            .query(&query.params());
        let resp = self.client.send(req).await?;

        let series: Vec<Series> = resp
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        info!("📈 Fetched {} series from {}", series.len(), endpoint);
        Ok(series)
    }

    pub async fn export(&self, endpoint: &str, query: &SeriesQuery) -> Result<ExportFile, TrackerError> {
        query.validate()?;

        let path = format!("{}/export", endpoint.trim_end_matches('/'));
        let req = self
            .client
            .request(Method::GET, &path)?
            .query(&query.params());
        let resp = self.client.send(req).await?;

        let filename = resp
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_content_disposition)
            .unwrap_or_else(|| DEFAULT_EXPORT_FILENAME.to_string());

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        info!("📄 Exported {} ({} bytes)", filename, bytes.len());
        Ok(ExportFile { filename, bytes: bytes.to_vec() })
    }
}

/// Extract the filename from a `Content-Disposition` header value.
///
/// `filename*=UTF-8''...` wins over a plain `filename=`.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    let extended = Regex::new(r#"(?i)filename\*\s*=\s*(?:[\w-]+'[^']*')?"?([^";]+)"?"#).ok()?;
    let plain = Regex::new(r#"(?i)filename\s*=\s*"?([^";]+)"?"#).ok()?;

    // RFC 5987 values arrive percent-encoded
    let raw = match extended.captures(header).and_then(|c| c.get(1)) {
        Some(m) => urlencoding::decode(m.as_str().trim()).ok()?.into_owned(),
        None => plain.captures(header)?.get(1)?.as_str().trim().to_string(),
    };

    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
