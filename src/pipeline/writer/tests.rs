use super::*;
use crate::pipeline::testing::{result, text_row, MemoryDestination, MemorySource};
use chrono::{FixedOffset, TimeZone};

fn columns(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn test_clear_statement() {
    assert_eq!(clear_statement("dbo.lote"), "TRUNCATE TABLE dbo.lote");
}

#[test]
fn test_ordered_rows_follow_requested_columns() {
    let table = result(&["a", "b"], vec![text_row(&["1", "2"])]);

    let rows = ordered_rows(&table, &columns(&["b", "a"])).unwrap();
    assert_eq!(rows, vec![text_row(&["2", "1"])]);
}

#[test]
fn test_ordered_rows_rejects_unknown_column() {
    let table = result(&["a"], vec![text_row(&["1"])]);

    let err = ordered_rows(&table, &columns(&["a", "z"])).unwrap_err();
    assert_eq!(err.kind(), "transport");
}

#[test]
fn test_ordered_rows_flatten_zoned_and_non_finite() {
    let zoned = FixedOffset::west_opt(3 * 3600)
        .unwrap()
        .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .unwrap();
    let table = result(
        &["quando", "valor"],
        vec![vec![CellValue::ZonedTimestamp(zoned), CellValue::Float(f64::NAN)]],
    );

    let rows = ordered_rows(&table, &columns(&["quando", "valor"])).unwrap();
    assert_eq!(
        rows[0],
        vec![CellValue::Timestamp(zoned.naive_local()), CellValue::Null]
    );
}

#[tokio::test]
async fn test_replace_load_clears_then_inserts_in_batches() {
    let destination = MemoryDestination::new()
        .with_rows("dbo.lote", vec![text_row(&["antigo"])]);
    let rows = (0..5).map(|i| vec![CellValue::Integer(i)]).collect();
    let table = result(&["id"], rows);

    let written = replace_load(&destination, "dbo.lote", &table, &columns(&["id"]), 2)
        .await
        .unwrap();

    assert_eq!(written, 5);
    assert_eq!(destination.rows("dbo.lote").len(), 5);
    assert_eq!(
        destination.operations(),
        vec![
            "TRUNCATE TABLE dbo.lote",
            "insert dbo.lote (2 rows)",
            "insert dbo.lote (2 rows)",
            "insert dbo.lote (1 rows)",
        ]
    );
}

#[tokio::test]
async fn test_replace_load_is_idempotent() {
    let destination = MemoryDestination::new();
    let table = result(&["id", "nome"], vec![text_row(&["1", "a"]), text_row(&["2", "b"])]);
    let cols = columns(&["id", "nome"]);

    replace_load(&destination, "dbo.lote", &table, &cols, DEFAULT_BATCH_SIZE)
        .await
        .unwrap();
    let once = destination.rows("dbo.lote");

    replace_load(&destination, "dbo.lote", &table, &cols, DEFAULT_BATCH_SIZE)
        .await
        .unwrap();
    assert_eq!(destination.rows("dbo.lote"), once);
    assert_eq!(destination.columns("dbo.lote"), cols);
}

#[tokio::test]
async fn test_replace_load_with_zero_rows_still_clears() {
    let destination = MemoryDestination::new()
        .with_rows("dbo.lote", vec![text_row(&["antigo"])]);
    let table = result(&["id"], vec![]);

    let written = replace_load(&destination, "dbo.lote", &table, &columns(&["id"]), 0)
        .await
        .unwrap();
    assert_eq!(written, 0);
    assert!(destination.rows("dbo.lote").is_empty());
}

#[tokio::test]
async fn test_replace_load_into_source_uses_result_columns() {
    let source = MemorySource::new()
        .with_table("SYSDATACOM.TB_LSB_INT_PROGRAMACAO", vec![text_row(&["velho"])]);
    let table = result(&["ordem", "maquina"], vec![text_row(&["1", "M1"])]);

    let written = replace_load_into_source(&source, "SYSDATACOM.TB_LSB_INT_PROGRAMACAO", &table, 1000)
        .await
        .unwrap();

    assert_eq!(written, 1);
    assert_eq!(
        source.table_rows("SYSDATACOM.TB_LSB_INT_PROGRAMACAO"),
        vec![text_row(&["1", "M1"])]
    );
}
