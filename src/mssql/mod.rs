// =====================================================
// MSSQL DESTINATION OPERATIONS (via Tiberius)
// =====================================================

use crate::db_types::{CellValue, ConnectionConfig, QueryResult};
use crate::error::{PipelineError, Result};
use crate::pipeline::schema::split_table_name;
use crate::pipeline::systems::DestinationSystem;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use deadpool_tiberius::{Manager, Pool};
use futures::TryStreamExt;
use tiberius::{AuthMethod, ColumnData, FromSql, QueryItem};

/// SQL Server accepts at most this many row value expressions per `INSERT ... VALUES`.
pub const MAX_ROWS_PER_INSERT: usize = 1_000;

const COLUMNS_QUERY: &str = "SELECT COLUMN_NAME, DATA_TYPE \
     FROM INFORMATION_SCHEMA.COLUMNS \
     WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2 \
     ORDER BY ORDINAL_POSITION";

fn destination_error(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Destination(e.to_string())
}

// --- Connection ---

pub fn create_pool(config: &ConnectionConfig) -> Result<Pool> {
    let initial_db = config.database.as_deref().unwrap_or("master");

    Manager::new()
        .host(&config.host)
        .port(config.port)
        .authentication(AuthMethod::sql_server(
            &config.username,
            config.password.as_deref().unwrap_or(""),
        ))
        .database(initial_db)
        .trust_cert()
        .max_size(config.pool_size.max(1))
        .create_pool()
        .map_err(destination_error)
}

#[derive(Clone)]
pub struct MssqlDestination {
    pool: Pool,
}

impl MssqlDestination {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        let pool = create_pool(config)?;
        log::info!(
            "SQL Server pool ready for {}:{} ({})",
            config.host,
            config.port,
            config.database.as_deref().unwrap_or("master")
        );
        Ok(Self::new(pool))
    }
}

// --- Query Execution ---

/// Maps one cell to a `CellValue`. A non-NULL value of a type with no
/// mapping is an error rather than a silent NULL.
fn read_cell(column: &str, data: &ColumnData<'static>) -> Result<CellValue> {
    let value = match data {
        ColumnData::U8(v) => v.map(|v| CellValue::Integer(i64::from(v))),
        ColumnData::I16(v) => v.map(|v| CellValue::Integer(i64::from(v))),
        ColumnData::I32(v) => v.map(|v| CellValue::Integer(i64::from(v))),
        ColumnData::I64(v) => v.map(CellValue::Integer),
        ColumnData::F32(v) => v.map(|v| CellValue::Float(f64::from(v))),
        ColumnData::F64(v) => v.map(CellValue::Float),
        ColumnData::Numeric(v) => v.map(|v| CellValue::Float(f64::from(v))),
        ColumnData::Bit(v) => v.map(CellValue::Boolean),
        ColumnData::String(v) => v.as_deref().map(CellValue::text),
        ColumnData::Guid(v) => v.map(|v| CellValue::Text(v.to_string())),
        ColumnData::Binary(v) => v
            .as_deref()
            .map(|v| CellValue::Text(format!("0x{}", hex::encode(v)))),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data)
                .map_err(destination_error)?
                .map(CellValue::Timestamp)
        }
        ColumnData::Date(_) => NaiveDate::from_sql(data)
            .map_err(destination_error)?
            .map(CellValue::Date),
        ColumnData::Time(_) => NaiveTime::from_sql(data)
            .map_err(destination_error)?
            .map(CellValue::Time),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(data)
            .map_err(destination_error)?
            .map(CellValue::ZonedTimestamp),
        ColumnData::Xml(None) => None,
        _ => {
            return Err(PipelineError::Destination(format!(
                "Unsupported SQL Server value in column {}",
                column
            )))
        }
    };
    Ok(value.unwrap_or_default())
}

/// Runs `query` and returns its first result set.
pub async fn execute_query(pool: &Pool, query: &str) -> Result<QueryResult> {
    let mut conn = pool.get().await.map_err(destination_error)?;
    let mut stream = conn.query(query, &[]).await.map_err(destination_error)?;

    let mut columns = Vec::new();
    let mut rows = Vec::new();
    let mut result_sets = 0;

    while let Some(item) = stream.try_next().await.map_err(destination_error)? {
        match item {
            QueryItem::Metadata(meta) => {
                result_sets += 1;
                if result_sets == 1 {
                    columns = meta.columns().iter().map(|c| c.name().to_string()).collect();
                }
            }
            QueryItem::Row(row) if result_sets <= 1 => {
                if columns.is_empty() {
                    columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                }
                let cells = row
                    .cells()
                    .map(|(column, data)| read_cell(column.name(), data))
                    .collect::<Result<Vec<_>>>()?;
                rows.push(cells);
            }
            QueryItem::Row(_) => {}
        }
    }

    Ok(QueryResult::new(columns, rows))
}

pub async fn execute_statement(pool: &Pool, statement: &str) -> Result<u64> {
    let mut conn = pool.get().await.map_err(destination_error)?;
    let result = conn.execute(statement, &[]).await.map_err(destination_error)?;
    Ok(result.total())
}

// --- Metadata Helpers ---

pub async fn get_table_columns(
    pool: &Pool,
    schema: &str,
    table: &str,
) -> Result<Vec<(String, String)>> {
    let mut conn = pool.get().await.map_err(destination_error)?;
    let stream = conn
        .query(COLUMNS_QUERY, &[&schema, &table])
        .await
        .map_err(destination_error)?;
    let rows = stream.into_first_result().await.map_err(destination_error)?;

    Ok(rows
        .iter()
        .map(|row| {
            let name = row.try_get::<&str, _>(0).ok().flatten().unwrap_or("");
            let data_type = row.try_get::<&str, _>(1).ok().flatten().unwrap_or("");
            (name.to_string(), data_type.to_string())
        })
        .filter(|(name, _)| !name.is_empty())
        .collect())
}

// --- Literal Rendering ---

pub(crate) fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

pub(crate) fn qualified_table_name(table: &str) -> String {
    match table.find('.') {
        Some(_) => {
            let (schema, name) = split_table_name("", table);
            format!("{}.{}", quote_identifier(schema), quote_identifier(name))
        }
        None => quote_identifier(table),
    }
}

fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

pub(crate) fn value_to_sql_literal(value: &CellValue) -> String {
    match value {
        CellValue::Null => "NULL".to_string(),
        CellValue::Integer(v) => v.to_string(),
        CellValue::Float(v) if v.is_finite() => v.to_string(),
        CellValue::Float(_) => "NULL".to_string(),
        CellValue::Boolean(v) => if *v { "1" } else { "0" }.to_string(),
        CellValue::Text(v) => format!("N'{}'", escape_sql_string(v)),
        CellValue::Timestamp(v) => format!("'{}'", v.format("%Y-%m-%dT%H:%M:%S%.3f")),
        CellValue::ZonedTimestamp(v) => {
            format!("'{}'", v.naive_local().format("%Y-%m-%dT%H:%M:%S%.3f"))
        }
        CellValue::Date(v) => format!("'{}'", v.format("%Y-%m-%d")),
        CellValue::Time(v) => format!("'{}'", v.format("%H:%M:%S")),
    }
}

/// One multi-row `INSERT INTO ... VALUES (...), (...)` statement.
pub(crate) fn build_insert_statement(
    table: &str,
    columns: &[String],
    rows: &[Vec<CellValue>],
) -> Result<String> {
    if columns.is_empty() {
        return Err(PipelineError::Destination(
            "Cannot build insert statement without columns".to_string(),
        ));
    }
    if rows.len() > MAX_ROWS_PER_INSERT {
        return Err(PipelineError::Destination(format!(
            "At most {} rows fit in one INSERT statement, got {}",
            MAX_ROWS_PER_INSERT,
            rows.len()
        )));
    }

    let quoted_columns = columns
        .iter()
        .map(|column| quote_identifier(column))
        .collect::<Vec<_>>()
        .join(", ");

    let values = rows
        .iter()
        .map(|row| {
            let literals = (0..columns.len())
                .map(|index| value_to_sql_literal(row.get(index).unwrap_or(&CellValue::Null)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({})", literals)
        })
        .collect::<Vec<_>>()
        .join(",\n");

    Ok(format!(
        "INSERT INTO {} ({}) VALUES\n{}",
        qualified_table_name(table),
        quoted_columns,
        values
    ))
}

/// All statements for one commit batch; several statements share a transaction.
pub(crate) fn build_batch_statement(
    table: &str,
    columns: &[String],
    batch: &[Vec<CellValue>],
) -> Result<String> {
    let statements = batch
        .chunks(MAX_ROWS_PER_INSERT)
        .map(|chunk| build_insert_statement(table, columns, chunk))
        .collect::<Result<Vec<_>>>()?;

    if statements.len() == 1 {
        return Ok(statements.into_iter().next().unwrap_or_default());
    }
    Ok(format!(
        "SET XACT_ABORT ON;\nBEGIN TRANSACTION;\n{};\nCOMMIT TRANSACTION;",
        statements.join(";\n")
    ))
}

#[async_trait::async_trait]
impl DestinationSystem for MssqlDestination {
    async fn fetch_table(&self, statement: &str) -> Result<QueryResult> {
        execute_query(&self.pool, statement).await
    }

    async fn execute(&self, statement: &str) -> Result<()> {
        execute_statement(&self.pool, statement).await?;
        Ok(())
    }

    async fn insert_rows(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<CellValue>],
        commit_every: usize,
    ) -> Result<usize> {
        let mut written = 0;
        for batch in rows.chunks(commit_every.max(1)) {
            let statement = build_batch_statement(table, columns, batch)?;
            execute_statement(&self.pool, &statement).await?;
            written += batch.len();
            log::debug!("Committed {} of {} rows into {}", written, rows.len(), table);
        }
        Ok(written)
    }

    async fn table_columns(&self, schema: &str, table: &str) -> Result<Vec<(String, String)>> {
        get_table_columns(&self.pool, schema, table).await
    }
}

#[cfg(test)]
mod tests;
