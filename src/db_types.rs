// =====================================================
// COMMON DATABASE TYPES AND STRUCTURES
// =====================================================

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

// --- Cell Values ---

/// One loosely- or strictly-typed scalar as it moves between the two systems.
///
/// Source adapters produce whatever the driver hands back (numbers usually as
/// text, dates as native timestamps); the coercion engine narrows every cell
/// to the variant matching its destination column, or `Null`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
    Timestamp(NaiveDateTime),
    ZonedTimestamp(DateTime<FixedOffset>),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn type_label(&self) -> &'static str {
        match self {
            CellValue::Null => "null",
            CellValue::Integer(_) => "integer",
            CellValue::Float(_) => "float",
            CellValue::Boolean(_) => "boolean",
            CellValue::Text(_) => "text",
            CellValue::Timestamp(_) => "timestamp",
            CellValue::ZonedTimestamp(_) => "timestamp_tz",
            CellValue::Date(_) => "date",
            CellValue::Time(_) => "time",
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Integer(v) => write!(f, "{}", v),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Boolean(v) => write!(f, "{}", v),
            CellValue::Text(v) => f.write_str(v),
            CellValue::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
            CellValue::ZonedTimestamp(v) => write!(f, "{}", v.to_rfc3339()),
            CellValue::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            CellValue::Time(v) => write!(f, "{}", v.format("%H:%M:%S%.f")),
        }
    }
}

// --- Query Results ---

/// Tabular result of one statement, column names in result order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Lower-cases every column name in place.
    pub fn lowercase_columns(&mut self) {
        for column in self.columns.iter_mut() {
            *column = column.to_lowercase();
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }
}

// --- Connection Configuration ---

/// SQL Server connection settings.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub host: String,
    #[serde(default = "default_mssql_port")]
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub database: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_mssql_port() -> u16 {
    1433
}

fn default_pool_size() -> usize {
    4
}

/// Oracle connection settings; `connect_string` is an EZConnect string or TNS alias.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OracleConnectionConfig {
    pub username: String,
    pub password: Option<String>,
    pub connect_string: String,
}

#[cfg(test)]
mod tests;
