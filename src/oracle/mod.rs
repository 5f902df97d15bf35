// =====================================================
// ORACLE SOURCE OPERATIONS (via rust-oracle)
// =====================================================

use crate::config::RunFlagSettings;
use crate::db_types::{CellValue, OracleConnectionConfig, QueryResult};
use crate::error::{PipelineError, Result};
use crate::pipeline::notify::Notifier;
use crate::pipeline::systems::{RunFlagStore, SourceSystem};
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use oracle::sql_type::OracleType;
use oracle::{Connection, Row};
use regex::Regex;
use std::sync::{Arc, LazyLock, Mutex};

/// Rows per `INSERT ALL` statement; a batch larger than this spans several statements.
const MAX_ROWS_PER_STATEMENT: usize = 500;

static PLAIN_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_$#]*$").unwrap());

fn source_error(e: oracle::Error) -> PipelineError {
    PipelineError::Source(e.to_string())
}

// --- Connection ---

/// One blocking Oracle session shared by the source, flag store and mailer.
/// Every call runs on the blocking thread pool.
#[derive(Clone)]
pub struct OracleSource {
    conn: Arc<Mutex<Connection>>,
    flag_table: String,
}

impl OracleSource {
    pub async fn connect(config: &OracleConnectionConfig, run_flag: &RunFlagSettings) -> Result<Self> {
        let username = config.username.clone();
        let password = config.password.clone().unwrap_or_default();
        let connect_string = config.connect_string.clone();

        let conn = tokio::task::spawn_blocking(move || {
            Connection::connect(&username, &password, &connect_string)
        })
        .await
        .map_err(|e| PipelineError::Source(format!("Oracle connect task failed: {}", e)))?
        .map_err(source_error)?;

        log::info!("Connected to Oracle at {}", config.connect_string);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            flag_table: run_flag.table.clone(),
        })
    }

    async fn with_connection<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| PipelineError::Source("Oracle session lock poisoned".to_string()))?;
            work(&guard)
        })
        .await
        .map_err(|e| PipelineError::Source(format!("Oracle task failed: {}", e)))?
    }

    pub fn mailer(&self, sender: &str) -> OracleMailNotifier {
        OracleMailNotifier {
            source: self.clone(),
            sender: sender.to_string(),
        }
    }
}

// --- Query Execution ---

fn read_cell(row: &Row, index: usize, kind: &OracleType) -> oracle::Result<CellValue> {
    let value = match kind {
        OracleType::BinaryDouble | OracleType::BinaryFloat => {
            row.get::<_, Option<f64>>(index)?.map(CellValue::Float)
        }
        OracleType::Date | OracleType::Timestamp(_) => row
            .get::<_, Option<NaiveDateTime>>(index)?
            .map(CellValue::Timestamp),
        OracleType::TimestampTZ(_) | OracleType::TimestampLTZ(_) => row
            .get::<_, Option<DateTime<FixedOffset>>>(index)?
            .map(CellValue::ZonedTimestamp),
        // NUMBER keeps its full precision as text; coercion narrows it later.
        _ => row.get::<_, Option<String>>(index)?.map(CellValue::Text),
    };
    Ok(value.unwrap_or_default())
}

fn fetch_result(conn: &Connection, statement: &str) -> Result<QueryResult> {
    let rows = conn.query(statement, &[]).map_err(source_error)?;
    let info = rows.column_info().to_vec();
    let columns = info
        .iter()
        .map(|column| column.name().to_string())
        .collect::<Vec<_>>();

    let mut data = Vec::new();
    for row in rows {
        let row = row.map_err(source_error)?;
        let cells = info
            .iter()
            .enumerate()
            .map(|(index, column)| read_cell(&row, index, column.oracle_type()))
            .collect::<oracle::Result<Vec<_>>>()
            .map_err(source_error)?;
        data.push(cells);
    }

    Ok(QueryResult::new(columns, data))
}

fn execute_and_commit(conn: &Connection, statement: &str) -> Result<()> {
    conn.execute(statement, &[]).map_err(source_error)?;
    conn.commit().map_err(source_error)
}

// --- Literal Rendering ---

fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

pub(crate) fn quote_identifier(name: &str) -> String {
    if PLAIN_IDENTIFIER.is_match(name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

pub(crate) fn value_to_sql_literal(value: &CellValue) -> String {
    match value {
        CellValue::Null => "NULL".to_string(),
        CellValue::Integer(v) => v.to_string(),
        CellValue::Float(v) if v.is_finite() => v.to_string(),
        CellValue::Float(_) => "NULL".to_string(),
        CellValue::Boolean(v) => if *v { "1" } else { "0" }.to_string(),
        CellValue::Text(v) => format!("'{}'", escape_sql_string(v)),
        CellValue::Timestamp(v) => {
            format!("TIMESTAMP '{}'", v.format("%Y-%m-%d %H:%M:%S%.f"))
        }
        CellValue::ZonedTimestamp(v) => {
            format!("TIMESTAMP '{}'", v.format("%Y-%m-%d %H:%M:%S%.f %:z"))
        }
        CellValue::Date(v) => format!("DATE '{}'", v.format("%Y-%m-%d")),
        CellValue::Time(v) => format!("'{}'", v.format("%H:%M:%S")),
    }
}

/// Multi-row `INSERT ALL ... SELECT 1 FROM DUAL` for one chunk of rows.
pub(crate) fn build_insert_statement(
    table: &str,
    columns: &[String],
    rows: &[Vec<CellValue>],
) -> Result<String> {
    if columns.is_empty() {
        return Err(PipelineError::Source(
            "Cannot build insert statement without columns".to_string(),
        ));
    }

    let quoted_columns = columns
        .iter()
        .map(|column| quote_identifier(column))
        .collect::<Vec<_>>()
        .join(", ");

    let mut statement = String::from("INSERT ALL");
    for row in rows {
        let values = (0..columns.len())
            .map(|index| value_to_sql_literal(row.get(index).unwrap_or(&CellValue::Null)))
            .collect::<Vec<_>>()
            .join(", ");
        statement.push_str(&format!(
            "\n  INTO {} ({}) VALUES ({})",
            table, quoted_columns, values
        ));
    }
    statement.push_str("\nSELECT 1 FROM DUAL");
    Ok(statement)
}

#[async_trait::async_trait]
impl SourceSystem for OracleSource {
    async fn fetch_table(&self, statement: &str) -> Result<QueryResult> {
        let statement = statement.to_string();
        self.with_connection(move |conn| fetch_result(conn, &statement))
            .await
    }

    async fn execute(&self, statement: &str) -> Result<()> {
        let statement = statement.to_string();
        self.with_connection(move |conn| execute_and_commit(conn, &statement))
            .await
    }

    async fn insert_rows(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<CellValue>],
        commit_every: usize,
    ) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let table = table.to_string();
        let columns = columns.to_vec();
        let rows = rows.to_vec();
        let commit_every = commit_every.max(1);

        self.with_connection(move |conn| {
            let mut written = 0;
            for batch in rows.chunks(commit_every) {
                for chunk in batch.chunks(MAX_ROWS_PER_STATEMENT) {
                    let statement = build_insert_statement(&table, &columns, chunk)?;
                    conn.execute(&statement, &[]).map_err(source_error)?;
                }
                conn.commit().map_err(source_error)?;
                written += batch.len();
                log::debug!("Committed {} of {} rows into {}", written, rows.len(), table);
            }
            Ok(written)
        })
        .await
    }
}

// --- Run Flag ---

#[async_trait::async_trait]
impl RunFlagStore for OracleSource {
    async fn read_flag(&self, key: &str) -> Result<Option<String>> {
        let statement = format!("SELECT value FROM {} WHERE param = :1", self.flag_table);
        let key = key.to_string();
        self.with_connection(move |conn| {
            let mut rows = conn.query(&statement, &[&key]).map_err(source_error)?;
            match rows.next() {
                Some(row) => row
                    .map_err(source_error)?
                    .get::<_, Option<String>>(0)
                    .map_err(source_error),
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| PipelineError::RunFlag(e.to_string()))
    }

    async fn write_flag(&self, key: &str, value: &str) -> Result<()> {
        let statement = format!("UPDATE {} SET value = :1 WHERE param = :2", self.flag_table);
        let key = key.to_string();
        let value = value.to_string();
        self.with_connection(move |conn| {
            conn.execute(&statement, &[&value, &key])
                .map_err(source_error)?;
            conn.commit().map_err(source_error)
        })
        .await
        .map_err(|e| PipelineError::RunFlag(e.to_string()))
    }
}

// --- Mail ---

const SEND_MAIL_BLOCK: &str = "BEGIN
  PC_SEND_MAIL(
    PSENDER    => :sender,
    PRECIPIENT => :recipient,
    PSUBJECT   => :subject,
    PMESSAGE   => :message
  );
  COMMIT;
END;";

/// Sends mail through the `PC_SEND_MAIL` procedure on the source database.
pub struct OracleMailNotifier {
    source: OracleSource,
    sender: String,
}

#[async_trait::async_trait]
impl Notifier for OracleMailNotifier {
    async fn notify(&self, recipient: &str, subject: &str, message: &str) -> Result<()> {
        let sender = self.sender.clone();
        let recipient = recipient.to_string();
        let subject = subject.to_string();
        let message = message.to_string();
        self.source
            .with_connection(move |conn| {
                conn.execute_named(
                    SEND_MAIL_BLOCK,
                    &[
                        ("sender", &sender),
                        ("recipient", &recipient),
                        ("subject", &subject),
                        ("message", &message),
                    ],
                )
                .map_err(source_error)?;
                Ok(())
            })
            .await
            .map_err(|e| PipelineError::Notification(e.to_string()))
    }
}
