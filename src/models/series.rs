use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Key of the summary field holding the first price of the range.
pub const INITIAL_VALUE_KEY: &str = "precio_inicial";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub fecha: String,
    pub valor: Option<f64>,
}

impl SeriesPoint {
    pub fn new(fecha: impl Into<String>, valor: Option<f64>) -> Self {
        Self { fecha: fecha.into(), valor }
    }

    /// Calendar date of the point.
    ///
    /// Only the `YYYY-MM-DD` prefix is read, so `2024-01-01T00:00:00Z` stays
    /// on January 1st whatever the local offset.
    pub fn date(&self) -> Option<NaiveDate> {
        parse_fecha(&self.fecha)
    }
}

pub fn parse_fecha(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeriesId {
    Number(i64),
    Text(String),
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesId::Number(n) => write!(f, "{}", n),
            SeriesId::Text(s) => f.write_str(s),
        }
    }
}

/// Derived metrics computed by the backend. Only read and ordered here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SummaryStats(pub BTreeMap<String, serde_json::Value>);

impl SummaryStats {
    /// Numeric value of a metric, `None` when absent, null or not a number.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(serde_json::Value::as_f64)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(serde_json::Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    #[serde(alias = "product_name", alias = "pais", alias = "nombre")]
    pub name: String,
    #[serde(default, alias = "fuente", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SeriesId>,
    #[serde(default)]
    pub data: Vec<SeriesPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryStats>,
}

impl Series {
    pub fn new(name: impl Into<String>, data: Vec<SeriesPoint>) -> Self {
        Self {
            name: name.into(),
            source: None,
            id: None,
            data,
            summary: None,
        }
    }

    pub fn with_summary(mut self, summary: SummaryStats) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn first_value(&self) -> Option<f64> {
        self.data.first().and_then(|p| p.valor)
    }

    pub fn last_value(&self) -> Option<f64> {
        self.data.last().and_then(|p| p.valor)
    }
}
