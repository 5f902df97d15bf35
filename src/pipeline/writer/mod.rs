// =====================================================
// REPLACE-LOAD WRITER
// =====================================================

use crate::db_types::{CellValue, QueryResult};
use crate::error::{PipelineError, Result};
use crate::pipeline::systems::{DestinationSystem, SourceSystem};

pub const DEFAULT_BATCH_SIZE: usize = 1_000;

/// Clears `table` and inserts every row of `coerced` in `batch_size` batches.
///
/// The table is empty between the clear and the last committed batch; nothing
/// may read it mid-run. Running this twice with the same input leaves the
/// same contents as running it once.
pub async fn replace_load(
    destination: &dyn DestinationSystem,
    table: &str,
    coerced: &QueryResult,
    columns: &[String],
    batch_size: usize,
) -> Result<usize> {
    let rows = ordered_rows(coerced, columns)?;

    destination.execute(&clear_statement(table)).await?;
    let written = destination
        .insert_rows(table, columns, &rows, effective_batch_size(batch_size))
        .await?;

    log::info!("Loaded {} rows into {}", written, table);
    Ok(written)
}

/// Same replace semantics as [`replace_load`], with the systems swapped and
/// the rows taken as they were read, without reconciliation.
pub async fn replace_load_into_source(
    source: &dyn SourceSystem,
    table: &str,
    rows: &QueryResult,
    batch_size: usize,
) -> Result<usize> {
    let tuples = ordered_rows(rows, &rows.columns)?;

    source.execute(&clear_statement(table)).await?;
    let written = source
        .insert_rows(table, &rows.columns, &tuples, effective_batch_size(batch_size))
        .await?;

    log::info!("Loaded {} rows into {}", written, table);
    Ok(written)
}

pub fn clear_statement(table: &str) -> String {
    format!("TRUNCATE TABLE {}", table)
}

fn effective_batch_size(batch_size: usize) -> usize {
    if batch_size == 0 {
        DEFAULT_BATCH_SIZE
    } else {
        batch_size
    }
}

/// Rows as plain tuples in `columns` order, zoned timestamps flattened to naive ones.
pub fn ordered_rows(table: &QueryResult, columns: &[String]) -> Result<Vec<Vec<CellValue>>> {
    let indices = columns
        .iter()
        .map(|column| {
            table.column_index(column).ok_or_else(|| {
                PipelineError::Destination(format!(
                    "Column '{}' is not present in the table being written",
                    column
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(table
        .rows
        .iter()
        .map(|row| {
            indices
                .iter()
                .map(|index| normalize_cell(row.get(*index).cloned().unwrap_or_default()))
                .collect::<Vec<_>>()
        })
        .collect())
}

fn normalize_cell(value: CellValue) -> CellValue {
    match value {
        CellValue::ZonedTimestamp(dt) => CellValue::Timestamp(dt.naive_local()),
        CellValue::Float(v) if !v.is_finite() => CellValue::Null,
        other => other,
    }
}

#[cfg(test)]
mod tests;
