use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

use crate::models::{parse_fecha, Series, SeriesId, SummaryStats, INITIAL_VALUE_KEY};

pub const EMPTY_CELL: &str = "—";
pub const DEFAULT_EMPTY_MESSAGE: &str = "No hay datos para el período seleccionado";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("unknown column: {0}")]
    UnknownColumn(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flip(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortState {
    pub key: String,
    pub direction: SortDirection,
}

/// Raw value a column sorts on. Formatting never feeds back into this.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Text(Option<String>),
    Number(Option<f64>),
}

impl SortValue {
    fn is_null(&self) -> bool {
        match self {
            SortValue::Text(v) => v.is_none(),
            SortValue::Number(v) => v.map(f64::is_nan).unwrap_or(true),
        }
    }

    fn folded(self) -> Self {
        match self {
            SortValue::Text(v) => SortValue::Text(v.map(|s| s.to_lowercase())),
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellFormat {
    Text,
    Number { decimals: usize },
    Percent { decimals: usize },
    Currency { decimals: usize },
    Date,
}

pub struct Column<R> {
    pub key: String,
    pub header: String,
    pub format: CellFormat,
    value: Box<dyn Fn(&R) -> SortValue + Send + Sync>,
}

impl<R> Column<R> {
    pub fn new<F>(key: impl Into<String>, header: impl Into<String>, format: CellFormat, value: F) -> Self
    where
        F: Fn(&R) -> SortValue + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            header: header.into(),
            format,
            value: Box::new(value),
        }
    }

    pub fn value(&self, row: &R) -> SortValue {
        (self.value)(row)
    }

    pub fn format_cell(&self, row: &R) -> String {
        format_value(&self.value(row), self.format)
    }
}

impl<R> fmt::Debug for Column<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("key", &self.key)
            .field("header", &self.header)
            .field("format", &self.format)
            .finish()
    }
}

pub fn format_value(value: &SortValue, format: CellFormat) -> String {
    match (value, format) {
        (v, _) if v.is_null() => EMPTY_CELL.to_string(),
        (SortValue::Number(Some(n)), CellFormat::Number { decimals }) => format!("{:.*}", decimals, n),
        (SortValue::Number(Some(n)), CellFormat::Percent { decimals }) => format!("{:.*}%", decimals, n),
        (SortValue::Number(Some(n)), CellFormat::Currency { decimals }) => format!("$ {:.*}", decimals, n),
        (SortValue::Number(Some(n)), _) => n.to_string(),
        (SortValue::Text(Some(s)), CellFormat::Date) => parse_fecha(s)
            .map(|d| d.format("%d/%m/%Y").to_string())
            .unwrap_or_else(|| s.clone()),
        (SortValue::Text(Some(s)), _) => s.clone(),
        _ => EMPTY_CELL.to_string(),
    }
}

/// Nulls go last in both directions; text compares case-insensitively.
fn compare(a: &SortValue, b: &SortValue, direction: SortDirection) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    let ord = match (a, b) {
        (SortValue::Number(Some(x)), SortValue::Number(Some(y))) => x.total_cmp(y),
        (SortValue::Text(Some(x)), SortValue::Text(Some(y))) => x.cmp(y),
        (SortValue::Number(_), SortValue::Text(_)) => Ordering::Less,
        (SortValue::Text(_), SortValue::Number(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    };

    match direction {
        SortDirection::Asc => ord,
        SortDirection::Desc => ord.reverse(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableView {
    Empty { message: String },
    Rows { headers: Vec<String>, rows: Vec<Vec<String>> },
}

/// Sortable, formatted view over rows it never mutates.
pub struct DerivedTable<R> {
    columns: Vec<Column<R>>,
    rows: Vec<R>,
    sort: Option<SortState>,
}

impl<R> DerivedTable<R> {
    pub fn new(columns: Vec<Column<R>>, rows: Vec<R>) -> Self {
        Self {
            columns,
            rows,
            sort: None,
        }
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn sort_state(&self) -> Option<&SortState> {
        self.sort.as_ref()
    }

    fn column(&self, key: &str) -> Result<&Column<R>, TableError> {
        self.columns
            .iter()
            .find(|c| c.key == key)
            .ok_or_else(|| TableError::UnknownColumn(key.to_string()))
    }

    /// Header click: the same key flips direction, a new key starts ascending.
    pub fn toggle_sort(&mut self, key: &str) -> Result<&SortState, TableError> {
        self.column(key)?;
        let direction = match &self.sort {
            Some(current) if current.key == key => current.direction.flip(),
            _ => SortDirection::Asc,
        };
        Ok(self.sort.insert(SortState { key: key.to_string(), direction }))
    }

    pub fn set_sort(&mut self, key: &str, direction: SortDirection) -> Result<(), TableError> {
        self.column(key)?;
        self.sort = Some(SortState { key: key.to_string(), direction });
        Ok(())
    }

    /// Stable sort of the input rows by one column.
    pub fn sort(&self, key: &str, direction: SortDirection) -> Result<Vec<&R>, TableError> {
        let column = self.column(key)?;

        let mut keyed: Vec<(SortValue, &R)> = self
            .rows
            .iter()
            .map(|row| (column.value(row).folded(), row))
            .collect();
        keyed.sort_by(|(a, _), (b, _)| compare(a, b, direction));

        Ok(keyed.into_iter().map(|(_, row)| row).collect())
    }

    /// Rows in the current sort order, or input order when unsorted.
    pub fn sorted_rows(&self) -> Vec<&R> {
        match &self.sort {
            Some(state) => self
                .sort(&state.key, state.direction)
                .unwrap_or_else(|_| self.rows.iter().collect()),
            None => self.rows.iter().collect(),
        }
    }

    pub fn render(&self) -> TableView {
        if self.rows.is_empty() {
            return TableView::Empty { message: DEFAULT_EMPTY_MESSAGE.to_string() };
        }

        let headers = self.columns.iter().map(|c| c.header.clone()).collect();
        let rows = self
            .sorted_rows()
            .into_iter()
            .map(|row| self.columns.iter().map(|c| c.format_cell(row)).collect())
            .collect();

        TableView::Rows { headers, rows }
    }
}

/// One series that made it through `project`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub name: String,
    pub source: Option<String>,
    pub id: Option<SeriesId>,
    pub summary: SummaryStats,
}

/// Keep only series whose summary carries a numeric initial price.
pub fn project(series: &[Series]) -> Vec<TableRow> {
    project_with(series, INITIAL_VALUE_KEY)
}

/// Strict filter on `initial_key`: failing rows are dropped, never shown as N/A.
pub fn project_with(series: &[Series], initial_key: &str) -> Vec<TableRow> {
    series
        .iter()
        .filter_map(|s| {
            let summary = s.summary.as_ref()?;
            summary.number(initial_key)?;
            Some(TableRow {
                name: s.name.clone(),
                source: s.source.clone(),
                id: s.id.clone(),
                summary: summary.clone(),
            })
        })
        .collect()
}

/// A summary metric shown as a column.
#[derive(Debug, Clone, Copy)]
pub struct Metric<'a> {
    pub key: &'a str,
    pub header: &'a str,
    pub format: CellFormat,
}

/// Summary metrics the price dashboards display.
pub const PRICE_METRICS: &[Metric<'static>] = &[
    Metric { key: "precio_inicial", header: "Precio inicial", format: CellFormat::Currency { decimals: 2 } },
    Metric { key: "precio_final", header: "Precio final", format: CellFormat::Currency { decimals: 2 } },
    Metric { key: "variacion_total", header: "Variación total", format: CellFormat::Percent { decimals: 2 } },
    Metric { key: "variacion_12m", header: "Variación 12 meses", format: CellFormat::Percent { decimals: 2 } },
];

/// `nombre` followed by one column per metric.
pub fn series_columns(metrics: &[Metric<'_>]) -> Vec<Column<TableRow>> {
    let mut columns = vec![Column::new("nombre", "Nombre", CellFormat::Text, |r: &TableRow| {
        SortValue::Text(Some(r.name.clone()))
    })];

    for metric in metrics {
        let key = metric.key.to_string();
        let column = match metric.format {
            CellFormat::Text | CellFormat::Date => Column::new(metric.key, metric.header, metric.format, move |r: &TableRow| {
                SortValue::Text(r.summary.text(&key).map(str::to_string))
            }),
            _ => Column::new(metric.key, metric.header, metric.format, move |r: &TableRow| {
                SortValue::Number(r.summary.number(&key))
            }),
        };
        columns.push(column);
    }
    columns
}

pub fn series_table(series: &[Series], metrics: &[Metric<'_>]) -> DerivedTable<TableRow> {
    DerivedTable::new(series_columns(metrics), project(series))
}
