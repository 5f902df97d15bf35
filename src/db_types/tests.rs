use super::*;

#[test]
fn test_cell_value_default_is_null() {
    assert!(CellValue::default().is_null());
    assert_eq!(CellValue::Null.type_label(), "null");
    assert_eq!(CellValue::text("a").type_label(), "text");
}

#[test]
fn test_cell_value_display() {
    let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(14, 5, 0)
        .unwrap();

    assert_eq!(CellValue::Null.to_string(), "");
    assert_eq!(CellValue::Integer(12).to_string(), "12");
    assert_eq!(CellValue::Boolean(true).to_string(), "true");
    assert_eq!(CellValue::Timestamp(ts).to_string(), "2024-03-01 14:05:00");
    assert_eq!(
        CellValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()).to_string(),
        "2024-03-01"
    );
}

#[test]
fn test_query_result_helpers() {
    let mut result = QueryResult::new(
        vec!["ID".to_string(), "Nome".to_string()],
        vec![vec![CellValue::Integer(1), CellValue::text("x")]],
    );

    assert!(!result.is_empty());
    assert_eq!(result.row_count(), 1);
    result.lowercase_columns();
    assert_eq!(result.columns, vec!["id", "nome"]);
    assert_eq!(result.column_index("nome"), Some(1));
    assert_eq!(result.column_index("Nome"), None);
    assert!(QueryResult::new(vec!["id".to_string()], vec![]).is_empty());
}

#[test]
fn test_connection_config_defaults() {
    let config: ConnectionConfig =
        serde_json::from_str(r#"{ "host": "h", "username": "u" }"#).unwrap();
    assert_eq!(config.port, 1433);
    assert_eq!(config.pool_size, 4);
    assert!(config.password.is_none());
}
