// =====================================================
// DESTINATION SCHEMA INTROSPECTION
// =====================================================

use crate::error::{PipelineError, Result};
use crate::pipeline::systems::DestinationSystem;
use serde::Serialize;

pub const DEFAULT_SCHEMA: &str = "dbo";

/// Semantic type a destination column is coerced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Integer,
    Boolean,
    Float,
    #[default]
    Text,
    Timestamp,
    Date,
    Time,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Float => "float",
            Self::Text => "text",
            Self::Timestamp => "timestamp",
            Self::Date => "date",
            Self::Time => "time",
        }
    }

    /// Classifies a SQL Server `DATA_TYPE`. Unrecognized types are text.
    pub fn from_declared_type(declared: &str) -> Self {
        match declared.trim().to_ascii_lowercase().as_str() {
            "int" | "bigint" | "smallint" | "tinyint" => Self::Integer,
            "bit" => Self::Boolean,
            "money" | "smallmoney" | "decimal" | "numeric" | "float" | "real" => Self::Float,
            "datetime" | "datetime2" | "smalldatetime" => Self::Timestamp,
            "date" => Self::Date,
            "time" => Self::Time,
            _ => Self::Text,
        }
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Timestamp | Self::Date | Self::Time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaColumn {
    pub name: String,
    pub declared_type: String,
    pub kind: ColumnKind,
}

/// Ordered column list of one destination table, as read from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationSchema {
    table: String,
    columns: Vec<SchemaColumn>,
}

impl DestinationSchema {
    /// Builds a schema from catalog rows, lower-casing names and types.
    /// A repeated column name keeps its first position.
    pub fn from_catalog_rows(table: &str, rows: Vec<(String, String)>) -> Self {
        let mut columns: Vec<SchemaColumn> = Vec::with_capacity(rows.len());
        for (name, declared_type) in rows {
            let name = name.to_lowercase();
            if columns.iter().any(|column| column.name == name) {
                continue;
            }
            let declared_type = declared_type.to_lowercase();
            columns.push(SchemaColumn {
                kind: ColumnKind::from_declared_type(&declared_type),
                name,
                declared_type,
            });
        }
        Self {
            table: table.to_string(),
            columns,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .map(|column| column.kind)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

pub(crate) fn split_table_name<'a>(default_schema: &'a str, table: &'a str) -> (&'a str, &'a str) {
    if let Some(pos) = table.find('.') {
        (&table[..pos], &table[pos + 1..])
    } else {
        (default_schema, table)
    }
}

/// Reads the destination catalog for `full_name` (`schema.table` or `table`).
pub async fn introspect(
    destination: &dyn DestinationSystem,
    full_name: &str,
    default_schema: &str,
) -> Result<DestinationSchema> {
    let (schema, table) = split_table_name(default_schema, full_name);
    let rows = destination.table_columns(schema, table).await?;
    if rows.is_empty() {
        return Err(PipelineError::NotFound(full_name.to_string()));
    }

    let destination_schema = DestinationSchema::from_catalog_rows(full_name, rows);
    log::debug!(
        "Destination columns for {}: {:?}",
        full_name,
        destination_schema.column_names()
    );
    Ok(destination_schema)
}
