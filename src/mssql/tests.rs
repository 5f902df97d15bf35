use super::*;
use std::borrow::Cow;
use tiberius::xml::XmlData;

#[test]
fn test_split_table_name() {
    assert_eq!(split_table_name("dbo", "lote"), ("dbo", "lote"));
    assert_eq!(split_table_name("dbo", "Sales.Orders"), ("Sales", "Orders"));
    assert_eq!(split_table_name("dbo", "staging.estoque"), ("staging", "estoque"));
}

#[test]
fn test_qualified_table_name() {
    assert_eq!(qualified_table_name("dbo.estoque"), "[dbo].[estoque]");
    assert_eq!(qualified_table_name("LSB_INT_Programacao"), "[LSB_INT_Programacao]");
    assert_eq!(quote_identifier("odd]name"), "[odd]]name]");
}

#[test]
fn test_value_to_sql_literal() {
    let ts = NaiveDate::from_ymd_opt(2024, 12, 31)
        .unwrap()
        .and_hms_milli_opt(10, 0, 0, 123)
        .unwrap();

    assert_eq!(value_to_sql_literal(&CellValue::Null), "NULL");
    assert_eq!(value_to_sql_literal(&CellValue::Integer(-7)), "-7");
    assert_eq!(value_to_sql_literal(&CellValue::Float(10.25)), "10.25");
    assert_eq!(value_to_sql_literal(&CellValue::Float(f64::INFINITY)), "NULL");
    assert_eq!(value_to_sql_literal(&CellValue::Boolean(false)), "0");
    assert_eq!(value_to_sql_literal(&CellValue::text("d'água")), "N'd''água'");
    assert_eq!(
        value_to_sql_literal(&CellValue::Timestamp(ts)),
        "'2024-12-31T10:00:00.123'"
    );
    assert_eq!(
        value_to_sql_literal(&CellValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())),
        "'2024-02-29'"
    );
}

#[test]
fn test_build_insert_statement() {
    let columns = vec!["id".to_string(), "ativo".to_string()];
    let rows = vec![
        vec![CellValue::Integer(1), CellValue::Boolean(true)],
        vec![CellValue::Integer(2), CellValue::Null],
    ];

    let statement = build_insert_statement("dbo.lote", &columns, &rows).unwrap();
    assert_eq!(
        statement,
        "INSERT INTO [dbo].[lote] ([id], [ativo]) VALUES\n(1, 1),\n(2, NULL)"
    );
}

#[test]
fn test_build_insert_statement_rejects_oversized_chunk() {
    let columns = vec!["id".to_string()];
    let rows = vec![vec![CellValue::Integer(1)]; MAX_ROWS_PER_INSERT + 1];
    assert!(build_insert_statement("dbo.lote", &columns, &rows).is_err());
}

#[test]
fn test_build_batch_statement_splits_large_batches() {
    let columns = vec!["id".to_string()];

    let small = vec![vec![CellValue::Integer(1)]; 10];
    let statement = build_batch_statement("dbo.lote", &columns, &small).unwrap();
    assert!(statement.starts_with("INSERT INTO [dbo].[lote]"));
    assert!(!statement.contains("BEGIN TRANSACTION"));

    let large = vec![vec![CellValue::Integer(1)]; MAX_ROWS_PER_INSERT * 2 + 1];
    let statement = build_batch_statement("dbo.lote", &columns, &large).unwrap();
    assert!(statement.starts_with("SET XACT_ABORT ON;"));
    assert_eq!(statement.matches("INSERT INTO").count(), 3);
    assert!(statement.ends_with("COMMIT TRANSACTION;"));
}

#[test]
fn test_read_cell_maps_guid_and_binary() {
    let guid = tiberius::Uuid::parse_str("6f9619ff-8b86-d011-b42d-00c04fc964ff").unwrap();
    assert_eq!(
        read_cell("id", &ColumnData::Guid(Some(guid))).unwrap(),
        CellValue::text("6f9619ff-8b86-d011-b42d-00c04fc964ff")
    );

    let bytes: &'static [u8] = &[0xde, 0xad, 0x01];
    assert_eq!(
        read_cell("assinatura", &ColumnData::Binary(Some(Cow::Borrowed(bytes)))).unwrap(),
        CellValue::text("0xdead01")
    );
}

#[test]
fn test_read_cell_null_and_scalar_values() {
    assert_eq!(read_cell("id", &ColumnData::Guid(None)).unwrap(), CellValue::Null);
    assert_eq!(read_cell("blob", &ColumnData::Binary(None)).unwrap(), CellValue::Null);
    assert_eq!(read_cell("qtd", &ColumnData::I32(Some(7))).unwrap(), CellValue::Integer(7));
    assert_eq!(read_cell("ativo", &ColumnData::Bit(Some(true))).unwrap(), CellValue::Boolean(true));
    assert_eq!(
        read_cell("nome", &ColumnData::String(Some(Cow::Borrowed("OP-1")))).unwrap(),
        CellValue::text("OP-1")
    );
}

#[test]
fn test_read_cell_rejects_unsupported_value() {
    let xml = ColumnData::Xml(Some(Cow::Owned(XmlData::new("<ordem/>"))));

    let err = read_cell("detalhe", &xml).unwrap_err();
    assert!(matches!(err, PipelineError::Destination(_)));
    assert!(err.to_string().contains("detalhe"));
}
