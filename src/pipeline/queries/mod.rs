// =====================================================
// EXTRACTION STATEMENTS
// Queries file parsing and destination-table derivation
// =====================================================

use crate::error::{PipelineError, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

const STATEMENT_MARKER: &str = "--select";

static FUNCTION_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\btable\s*\(\s*([A-Za-z0-9_$#."]+)"#).unwrap()
});

static FUNCTION_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^fc_return_rs(?:_rel)?_").unwrap());

static NON_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_]").unwrap());

/// One hard-coded plural/singular mismatch between function and table names.
const PLURALIZATION_FIXES: &[(&str, &str)] = &[("estoques", "estoque")];

/// Statements in file order from every `--select` line.
pub fn parse_statements(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter(|line| line.trim().to_lowercase().starts_with(STATEMENT_MARKER))
        .map(|line| line.trim().trim_start_matches('-').trim().replace(';', ""))
        .filter(|statement| !statement.is_empty())
        .collect()
}

pub async fn read_statements(path: &Path) -> Result<Vec<String>> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(PipelineError::Configuration(format!(
            "Queries file not found: {}",
            path.display()
        )));
    }

    let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
        PipelineError::Configuration(format!(
            "Failed to read queries file {}: {}",
            path.display(),
            e
        ))
    })?;

    Ok(parse_statements(&contents))
}

/// Destination table for a statement such as
/// `SELECT * FROM TABLE(PKG.FC_RETURN_RS_REL_ESTOQUES(SYSDATE))` → `dbo.estoque`.
pub fn derive_destination_table(statement: &str, schema: &str) -> Result<String> {
    let reference = FUNCTION_REFERENCE
        .captures(statement)
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str())
        .ok_or_else(|| PipelineError::UnresolvedDestination(statement.to_string()))?;

    let function_name = reference
        .rsplit('.')
        .next()
        .unwrap_or(reference)
        .to_lowercase();
    let function_name = NON_IDENTIFIER.replace_all(&function_name, "");
    let mut table = FUNCTION_PREFIX.replace(&function_name, "").to_string();

    if table.is_empty() {
        return Err(PipelineError::UnresolvedDestination(statement.to_string()));
    }

    for (plural, singular) in PLURALIZATION_FIXES {
        if table.contains(plural) {
            table = table.replace(plural, singular);
        }
    }

    Ok(format!("{}.{}", schema, table))
}
