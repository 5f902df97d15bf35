use crate::db_types::{CellValue, QueryResult};
use crate::error::Result;

// Boundaries of the two relational systems. The pipeline only talks to these
// traits; `crate::oracle` and `crate::mssql` provide the live implementations.

#[async_trait::async_trait]
pub trait SourceSystem: Send + Sync {
    /// Runs a read statement and returns its full tabular result.
    async fn fetch_table(&self, statement: &str) -> Result<QueryResult>;

    /// Runs one maintenance statement and commits immediately.
    async fn execute(&self, statement: &str) -> Result<()>;

    /// Inserts `rows` (each ordered like `columns`), committing every `commit_every` rows.
    async fn insert_rows(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<CellValue>],
        commit_every: usize,
    ) -> Result<usize>;
}

#[async_trait::async_trait]
pub trait DestinationSystem: Send + Sync {
    async fn fetch_table(&self, statement: &str) -> Result<QueryResult>;

    async fn execute(&self, statement: &str) -> Result<()>;

    async fn insert_rows(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<CellValue>],
        commit_every: usize,
    ) -> Result<usize>;

    /// `(column name, declared type)` pairs in ordinal order; empty when the table is unknown.
    async fn table_columns(&self, schema: &str, table: &str) -> Result<Vec<(String, String)>>;
}

/// Key/value configuration storage holding the run-enable flag.
#[async_trait::async_trait]
pub trait RunFlagStore: Send + Sync {
    async fn read_flag(&self, key: &str) -> Result<Option<String>>;

    /// Writes the flag and commits immediately.
    async fn write_flag(&self, key: &str, value: &str) -> Result<()>;
}
