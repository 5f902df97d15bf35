// In-memory stand-ins for the source, destination and notifier, used by the
// pipeline tests in place of live Oracle / SQL Server connections.

use crate::db_types::{CellValue, QueryResult};
use crate::error::{PipelineError, Result};
use crate::pipeline::notify::Notifier;
use crate::pipeline::systems::{DestinationSystem, RunFlagStore, SourceSystem};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

pub fn text_row(values: &[&str]) -> Vec<CellValue> {
    values.iter().map(|value| CellValue::text(*value)).collect()
}

pub fn result(columns: &[&str], rows: Vec<Vec<CellValue>>) -> QueryResult {
    QueryResult::new(columns.iter().map(|c| c.to_string()).collect(), rows)
}

fn truncated_table(statement: &str) -> Option<&str> {
    let trimmed = statement.trim();
    let prefix = "TRUNCATE TABLE ";
    if trimmed.len() > prefix.len() && trimmed[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(trimmed[prefix.len()..].trim())
    } else {
        None
    }
}

// --- Source ---

#[derive(Debug, Default)]
pub struct SourceState {
    pub flags: HashMap<String, String>,
    pub tables: BTreeMap<String, Vec<Vec<CellValue>>>,
    pub operations: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MemorySource {
    results: HashMap<String, QueryResult>,
    failing_statements: HashSet<String>,
    fail_flag_reads: bool,
    discard_flag_writes: bool,
    state: Mutex<SourceState>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, statement: &str, result: QueryResult) -> Self {
        self.results.insert(statement.to_string(), result);
        self
    }

    pub fn with_failing_statement(mut self, statement: &str) -> Self {
        self.failing_statements.insert(statement.to_string());
        self
    }

    pub fn with_flag(self, key: &str, value: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .flags
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_table(self, table: &str, rows: Vec<Vec<CellValue>>) -> Self {
        self.state
            .lock()
            .unwrap()
            .tables
            .insert(table.to_string(), rows);
        self
    }

    pub fn failing_flag_reads(mut self) -> Self {
        self.fail_flag_reads = true;
        self
    }

    /// Flag writes succeed but are not persisted.
    pub fn discarding_flag_writes(mut self) -> Self {
        self.discard_flag_writes = true;
        self
    }

    pub fn flag(&self, key: &str) -> Option<String> {
        self.state.lock().unwrap().flags.get(key).cloned()
    }

    pub fn table_rows(&self, table: &str) -> Vec<Vec<CellValue>> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn operations(&self) -> Vec<String> {
        self.state.lock().unwrap().operations.clone()
    }
}

#[async_trait::async_trait]
impl SourceSystem for MemorySource {
    async fn fetch_table(&self, statement: &str) -> Result<QueryResult> {
        self.state
            .lock()
            .unwrap()
            .operations
            .push(format!("fetch {}", statement));
        if self.failing_statements.contains(statement) {
            return Err(PipelineError::Source(format!("ORA-00942: {}", statement)));
        }
        Ok(self.results.get(statement).cloned().unwrap_or_default())
    }

    async fn execute(&self, statement: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.operations.push(statement.to_string());
        if let Some(table) = truncated_table(statement) {
            state.tables.insert(table.to_string(), Vec::new());
        }
        Ok(())
    }

    async fn insert_rows(
        &self,
        table: &str,
        _columns: &[String],
        rows: &[Vec<CellValue>],
        commit_every: usize,
    ) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        for batch in rows.chunks(commit_every.max(1)) {
            state
                .operations
                .push(format!("insert {} ({} rows)", table, batch.len()));
            state
                .tables
                .entry(table.to_string())
                .or_default()
                .extend(batch.iter().cloned());
        }
        Ok(rows.len())
    }
}

#[async_trait::async_trait]
impl RunFlagStore for MemorySource {
    async fn read_flag(&self, key: &str) -> Result<Option<String>> {
        if self.fail_flag_reads {
            return Err(PipelineError::RunFlag(format!("cannot read {}", key)));
        }
        Ok(self.flag(key))
    }

    async fn write_flag(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.operations.push(format!("flag {}={}", key, value));
        if !self.discard_flag_writes {
            state.flags.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}

// --- Destination ---

#[derive(Debug, Default)]
pub struct DestinationState {
    pub tables: BTreeMap<String, Vec<Vec<CellValue>>>,
    pub columns: BTreeMap<String, Vec<String>>,
    pub operations: Vec<String>,
    pub writes: usize,
}

#[derive(Debug, Default)]
pub struct MemoryDestination {
    catalog: HashMap<String, Vec<(String, String)>>,
    results: HashMap<String, QueryResult>,
    failing_inserts: HashSet<String>,
    state: Mutex<DestinationState>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `full_name` (`schema.table`) with `(column, DATA_TYPE)` pairs.
    pub fn with_table(mut self, full_name: &str, columns: &[(&str, &str)]) -> Self {
        self.catalog.insert(
            full_name.to_lowercase(),
            columns
                .iter()
                .map(|(name, kind)| (name.to_string(), kind.to_string()))
                .collect(),
        );
        self
    }

    pub fn with_result(mut self, statement: &str, result: QueryResult) -> Self {
        self.results.insert(statement.to_string(), result);
        self
    }

    pub fn with_rows(self, table: &str, rows: Vec<Vec<CellValue>>) -> Self {
        self.state
            .lock()
            .unwrap()
            .tables
            .insert(table.to_string(), rows);
        self
    }

    pub fn with_failing_inserts(mut self, table: &str) -> Self {
        self.failing_inserts.insert(table.to_string());
        self
    }

    pub fn rows(&self, table: &str) -> Vec<Vec<CellValue>> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn columns(&self, table: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .columns
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Clear and insert statements issued so far.
    pub fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    pub fn operations(&self) -> Vec<String> {
        self.state.lock().unwrap().operations.clone()
    }
}

#[async_trait::async_trait]
impl DestinationSystem for MemoryDestination {
    async fn fetch_table(&self, statement: &str) -> Result<QueryResult> {
        self.state
            .lock()
            .unwrap()
            .operations
            .push(format!("fetch {}", statement));
        Ok(self.results.get(statement).cloned().unwrap_or_default())
    }

    async fn execute(&self, statement: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.operations.push(statement.to_string());
        state.writes += 1;
        if let Some(table) = truncated_table(statement) {
            state.tables.insert(table.to_string(), Vec::new());
        }
        Ok(())
    }

    async fn insert_rows(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<CellValue>],
        commit_every: usize,
    ) -> Result<usize> {
        if self.failing_inserts.contains(table) {
            return Err(PipelineError::Destination(format!(
                "Conversion failed when inserting into {}",
                table
            )));
        }
        let mut state = self.state.lock().unwrap();
        state.columns.insert(table.to_string(), columns.to_vec());
        for batch in rows.chunks(commit_every.max(1)) {
            state.writes += 1;
            state
                .operations
                .push(format!("insert {} ({} rows)", table, batch.len()));
            state
                .tables
                .entry(table.to_string())
                .or_default()
                .extend(batch.iter().cloned());
        }
        Ok(rows.len())
    }

    async fn table_columns(&self, schema: &str, table: &str) -> Result<Vec<(String, String)>> {
        let key = format!("{}.{}", schema, table).to_lowercase();
        self.state
            .lock()
            .unwrap()
            .operations
            .push(format!("columns {}", key));
        Ok(self.catalog.get(&key).cloned().unwrap_or_default())
    }
}

// --- Notifier ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub recipient: String,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    fail: bool,
    sent: Mutex<Vec<SentNotification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send fails after being recorded.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, recipient: &str, subject: &str, message: &str) -> Result<()> {
        self.sent.lock().unwrap().push(SentNotification {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            message: message.to_string(),
        });
        if self.fail {
            return Err(PipelineError::Notification("mail relay unavailable".to_string()));
        }
        Ok(())
    }
}

/// Writes `contents` to a temporary queries file, removed when the handle drops.
pub fn write_queries_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("aps-queries-")
        .suffix(".sql")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
