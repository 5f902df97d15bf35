// =====================================================
// EXTRACTION DRIVER
// Runs every statement of the queries file through the load pipeline
// =====================================================

use crate::config::PipelineConfig;
use crate::db_types::QueryResult;
use crate::error::Result;
use crate::pipeline::coerce::coerce_table;
use crate::pipeline::notify::FailureReporter;
use crate::pipeline::queries::{derive_destination_table, read_statements};
use crate::pipeline::reconcile::{reconcile, ColumnAliases, ReconciliationReport};
use crate::pipeline::schema::{introspect, DestinationSchema};
use crate::pipeline::systems::{DestinationSystem, SourceSystem};
use crate::pipeline::writer::replace_load;
use serde::Serialize;
use std::path::PathBuf;

const UNKNOWN_TABLE: &str = "unknown";

#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub queries_file: PathBuf,
    pub destination_schema: String,
    pub batch_size: usize,
    pub column_aliases: ColumnAliases,
}

impl From<&PipelineConfig> for ExtractionSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            queries_file: config.queries_file.clone(),
            destination_schema: config.destination_schema.clone(),
            batch_size: config.batch_size,
            column_aliases: config.column_aliases.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableLoadSummary {
    pub table: String,
    pub source_rows: usize,
    pub written_rows: usize,
    pub reconciliation: ReconciliationReport,
}

/// Loads every statement of the queries file in order.
///
/// The first failure is reported (naming the table when it is known) and
/// ends the whole run; later statements are not attempted.
pub async fn run_extraction(
    source: &dyn SourceSystem,
    destination: &dyn DestinationSystem,
    reporter: &FailureReporter<'_>,
    settings: &ExtractionSettings,
) -> Result<Vec<TableLoadSummary>> {
    let statements = match read_statements(&settings.queries_file).await {
        Ok(statements) => statements,
        Err(e) => {
            reporter
                .report("extraction and load into SQL Server", &e)
                .await;
            return Err(e);
        }
    };
    log::info!(
        "Found {} extraction statements in {}",
        statements.len(),
        settings.queries_file.display()
    );

    let mut summaries = Vec::new();
    for statement in &statements {
        let mut current_table: Option<String> = None;
        match load_statement(source, destination, settings, statement, &mut current_table).await {
            Ok(Some(summary)) => summaries.push(summary),
            Ok(None) => {}
            Err(e) => {
                let table = current_table.as_deref().unwrap_or(UNKNOWN_TABLE);
                reporter
                    .report(&format!("processing table {}", table), &e)
                    .await;
                return Err(e);
            }
        }
    }

    Ok(summaries)
}

/// One statement through introspect → reconcile → coerce → replace-load.
/// `Ok(None)` when the statement returned no rows.
async fn load_statement(
    source: &dyn SourceSystem,
    destination: &dyn DestinationSystem,
    settings: &ExtractionSettings,
    statement: &str,
    current_table: &mut Option<String>,
) -> Result<Option<TableLoadSummary>> {
    log::debug!("Running extraction statement: {}", statement);
    let mut result = source.fetch_table(statement).await?;
    result.lowercase_columns();
    if result.is_empty() {
        log::info!("Statement returned no rows, skipping: {}", statement);
        return Ok(None);
    }

    let table = derive_destination_table(statement, &settings.destination_schema)?;
    *current_table = Some(table.clone());
    log::info!("Processing table {}", table);

    let schema = introspect(destination, &table, &settings.destination_schema).await?;
    log::info!("Source columns: {:?}", result.columns);
    log::info!("Destination columns: {:?}", schema.column_names());

    let source_rows = result.row_count();
    let reconciled = reconcile(result, &schema, &settings.column_aliases);
    let coerced = coerce_table(reconciled.table, &schema);
    log_first_row(&coerced, &schema);

    let columns = schema.column_names();
    let written = replace_load(destination, &table, &coerced, &columns, settings.batch_size).await?;

    Ok(Some(TableLoadSummary {
        table,
        source_rows,
        written_rows: written,
        reconciliation: reconciled.report,
    }))
}

fn log_first_row(table: &QueryResult, schema: &DestinationSchema) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }

    let temporal = schema
        .columns()
        .iter()
        .filter(|column| column.kind.is_temporal())
        .map(|column| column.name.as_str())
        .collect::<Vec<_>>();
    if !temporal.is_empty() {
        log::debug!("Date/time columns: {:?}", temporal);
    }

    if let Some(row) = table.rows.first() {
        for (column, value) in table.columns.iter().zip(row.iter()) {
            if !value.is_null() {
                log::debug!("  {}: {} ({})", column, value, value.type_label());
            }
        }
    }
}
