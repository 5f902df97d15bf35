// =====================================================
// COLUMN RECONCILIATION
// Aligns an arbitrary result set with a destination schema
// =====================================================

use crate::db_types::{CellValue, QueryResult};
use crate::pipeline::schema::DestinationSchema;
use serde::Serialize;
use std::collections::BTreeMap;

/// Explicit incoming-name → destination-name renames, applied after exact matches.
pub type ColumnAliases = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    Exact,
    Alias,
    Normalized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnRename {
    pub from: String,
    pub to: String,
    pub rule: MatchRule,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub renamed: Vec<ColumnRename>,
    /// Destination columns the result did not provide; filled with NULL.
    pub missing: Vec<String>,
    /// Result columns with no destination counterpart; dropped.
    pub extra: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledTable {
    pub table: QueryResult,
    pub report: ReconciliationReport,
}

/// Lower-cases and drops underscores: `Order_Qty` and `orderqty` compare equal.
pub fn normalize_column_name(name: &str) -> String {
    name.to_lowercase().replace('_', "")
}

/// Schema position assigned to each incoming column, with the rule that matched.
///
/// Rules are applied in passes so priority holds across the whole result, not
/// only per column: every exact match claims its destination column first,
/// then aliases, then normalized matches. A destination column is claimed at
/// most once; later claimants become extra.
pub fn resolve_columns(
    incoming: &[String],
    schema: &DestinationSchema,
    aliases: &ColumnAliases,
) -> Vec<Option<(usize, MatchRule)>> {
    let mut assigned: Vec<Option<(usize, MatchRule)>> = vec![None; incoming.len()];
    let mut claimed = vec![false; schema.len()];

    for (index, name) in incoming.iter().enumerate() {
        if let Some(position) = schema.position(name) {
            if !claimed[position] {
                claimed[position] = true;
                assigned[index] = Some((position, MatchRule::Exact));
            }
        }
    }

    for (index, name) in incoming.iter().enumerate() {
        if assigned[index].is_some() {
            continue;
        }
        let target = aliases
            .get(name)
            .or_else(|| aliases.get(&name.to_lowercase()))
            .map(|target| target.to_lowercase());
        if let Some(position) = target.and_then(|target| schema.position(&target)) {
            if !claimed[position] {
                claimed[position] = true;
                assigned[index] = Some((position, MatchRule::Alias));
            }
        }
    }

    let normalized_schema = schema
        .columns()
        .iter()
        .map(|column| normalize_column_name(&column.name))
        .collect::<Vec<_>>();

    for (index, name) in incoming.iter().enumerate() {
        if assigned[index].is_some() {
            continue;
        }
        let normalized = normalize_column_name(name);
        let candidates = normalized_schema
            .iter()
            .enumerate()
            .filter(|(position, value)| !claimed[*position] && **value == normalized)
            .map(|(position, _)| position)
            .collect::<Vec<_>>();

        let chosen = match candidates.as_slice() {
            [] => None,
            [only] => Some(*only),
            many => {
                // Ambiguous: prefer the case-insensitive exact name, else schema order.
                let lowered = name.to_lowercase();
                let pick = many
                    .iter()
                    .copied()
                    .find(|position| schema.columns()[*position].name == lowered)
                    .unwrap_or(many[0]);
                log::warn!(
                    "Column '{}' matches several destination columns after normalization; using '{}'",
                    name,
                    schema.columns()[pick].name
                );
                Some(pick)
            }
        };

        if let Some(position) = chosen {
            claimed[position] = true;
            assigned[index] = Some((position, MatchRule::Normalized));
        }
    }

    assigned
}

/// Renames, drops and backfills the result's columns so they equal `schema`, in schema order.
pub fn reconcile(
    result: QueryResult,
    schema: &DestinationSchema,
    aliases: &ColumnAliases,
) -> ReconciledTable {
    let assigned = resolve_columns(&result.columns, schema, aliases);
    let mut report = ReconciliationReport::default();

    let mut source_for_target: Vec<Option<usize>> = vec![None; schema.len()];
    for (index, assignment) in assigned.iter().enumerate() {
        match assignment {
            Some((position, rule)) => {
                source_for_target[*position] = Some(index);
                if *rule != MatchRule::Exact {
                    report.renamed.push(ColumnRename {
                        from: result.columns[index].clone(),
                        to: schema.columns()[*position].name.clone(),
                        rule: *rule,
                    });
                }
            }
            None => report.extra.push(result.columns[index].clone()),
        }
    }

    for (position, source) in source_for_target.iter().enumerate() {
        if source.is_none() {
            report.missing.push(schema.columns()[position].name.clone());
        }
    }

    if !report.renamed.is_empty() {
        let pairs = report
            .renamed
            .iter()
            .map(|rename| format!("{} -> {}", rename.from, rename.to))
            .collect::<Vec<_>>();
        log::info!("Renaming columns for {}: {:?}", schema.table(), pairs);
    }
    if !report.missing.is_empty() {
        log::warn!(
            "Destination columns missing from result for {}: {:?}",
            schema.table(),
            report.missing
        );
    }
    if !report.extra.is_empty() {
        log::warn!(
            "Result columns not present in {} will be dropped: {:?}",
            schema.table(),
            report.extra
        );
    }

    let rows = result
        .rows
        .into_iter()
        .map(|mut row| {
            source_for_target
                .iter()
                .map(|source| match source {
                    Some(index) => row
                        .get_mut(*index)
                        .map(std::mem::take)
                        .unwrap_or(CellValue::Null),
                    None => CellValue::Null,
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    ReconciledTable {
        table: QueryResult::new(schema.column_names(), rows),
        report,
    }
}
