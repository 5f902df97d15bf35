// =====================================================
// TYPE COERCION
// Narrows every cell to its destination column's kind
// =====================================================

use crate::db_types::{CellValue, QueryResult};
use crate::pipeline::schema::{ColumnKind, DestinationSchema};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParsedTemporal {
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
}

/// Coerces every column of a reconciled table. Never fails: a value that
/// cannot be converted becomes NULL, or 0/false for integer/boolean columns.
pub fn coerce_table(mut table: QueryResult, schema: &DestinationSchema) -> QueryResult {
    let kinds = table
        .columns
        .iter()
        .map(|column| schema.kind_of(column).unwrap_or_default())
        .collect::<Vec<_>>();

    for row in table.rows.iter_mut() {
        for (cell, kind) in row.iter_mut().zip(kinds.iter()) {
            let value = std::mem::take(cell);
            *cell = coerce_value(value, *kind);
        }
    }

    normalize_null_sentinels(&mut table, &kinds);
    table
}

pub fn coerce_value(value: CellValue, kind: ColumnKind) -> CellValue {
    match kind {
        ColumnKind::Timestamp => to_timestamp(&value),
        ColumnKind::Date => to_date(&value),
        ColumnKind::Time => to_time(&value),
        ColumnKind::Integer => to_integer(&value),
        ColumnKind::Float => to_float(&value),
        ColumnKind::Boolean => to_boolean(&value),
        ColumnKind::Text => to_text(value),
    }
}

/// Replaces not-a-number floats left in float or text columns with NULL.
fn normalize_null_sentinels(table: &mut QueryResult, kinds: &[ColumnKind]) {
    for row in table.rows.iter_mut() {
        for (cell, kind) in row.iter_mut().zip(kinds.iter()) {
            if !matches!(kind, ColumnKind::Float | ColumnKind::Text) {
                continue;
            }
            if matches!(cell, CellValue::Float(v) if !v.is_finite()) {
                *cell = CellValue::Null;
            }
        }
    }
}

// --- Temporal ---

fn to_timestamp(value: &CellValue) -> CellValue {
    match temporal_from_cell(value, false) {
        Some(ParsedTemporal::DateTime(dt)) => CellValue::Timestamp(dt),
        Some(ParsedTemporal::Date(date)) => date
            .and_hms_opt(0, 0, 0)
            .map(CellValue::Timestamp)
            .unwrap_or(CellValue::Null),
        _ => CellValue::Null,
    }
}

fn to_date(value: &CellValue) -> CellValue {
    match temporal_from_cell(value, true) {
        Some(ParsedTemporal::DateTime(dt)) => CellValue::Date(dt.date()),
        Some(ParsedTemporal::Date(date)) => CellValue::Date(date),
        _ => CellValue::Null,
    }
}

fn to_time(value: &CellValue) -> CellValue {
    match temporal_from_cell(value, false) {
        Some(ParsedTemporal::DateTime(dt)) => CellValue::Time(dt.time()),
        Some(ParsedTemporal::Date(_)) => NaiveTime::from_hms_opt(0, 0, 0)
            .map(CellValue::Time)
            .unwrap_or(CellValue::Null),
        Some(ParsedTemporal::Time(time)) => CellValue::Time(time),
        None => CellValue::Null,
    }
}

fn temporal_from_cell(value: &CellValue, day_first: bool) -> Option<ParsedTemporal> {
    match value {
        CellValue::Timestamp(dt) => Some(ParsedTemporal::DateTime(*dt)),
        CellValue::ZonedTimestamp(dt) => Some(ParsedTemporal::DateTime(dt.naive_local())),
        CellValue::Date(date) => Some(ParsedTemporal::Date(*date)),
        CellValue::Time(time) => Some(ParsedTemporal::Time(*time)),
        CellValue::Integer(v) => epoch_to_datetime(*v as f64).map(ParsedTemporal::DateTime),
        CellValue::Float(v) => epoch_to_datetime(*v).map(ParsedTemporal::DateTime),
        CellValue::Text(raw) => parse_temporal_text(raw, day_first),
        CellValue::Null | CellValue::Boolean(_) => None,
    }
}

/// Parses a timestamp, date or bare time. `day_first` decides how ambiguous
/// slash/dash/dot dates such as `03/04/2024` are read; a reading that is
/// impossible one way (`31/12/2024`) still succeeds the other way. Plain
/// numbers with no date reading are epoch values, as for numeric cells.
fn parse_temporal_text(raw: &str, day_first: bool) -> Option<ParsedTemporal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(zoned) = parse_zoned_datetime(trimmed) {
        return Some(ParsedTemporal::DateTime(zoned.naive_local()));
    }

    let date_formats = candidate_date_formats(trimmed, day_first);

    if let Some(dt) = parse_naive_datetime(trimmed, &date_formats) {
        return Some(ParsedTemporal::DateTime(dt));
    }

    if let Some(date) = parse_naive_date(trimmed, &date_formats) {
        return Some(ParsedTemporal::Date(date));
    }

    if let Some(time) = parse_naive_time(trimmed) {
        return Some(ParsedTemporal::Time(time));
    }

    trimmed
        .parse::<f64>()
        .ok()
        .and_then(epoch_to_datetime)
        .map(ParsedTemporal::DateTime)
}

fn parse_zoned_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .or_else(|| DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z").ok())
        .or_else(|| DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%:z").ok())
        .or_else(|| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%:z").ok())
        .or_else(|| DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f %z").ok())
}

// chrono's `%Y` also accepts one or two digits, so the year-first and
// four-digit-year layouts are only offered when the text really has one.
const YEAR_FIRST_DATES: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

const NAMED_MONTH_DATES: &[&str] = &["%d-%b-%y", "%d-%b-%Y"];

const DAY_FIRST_DATES: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];

const DAY_FIRST_SHORT_YEAR_DATES: &[&str] = &["%d/%m/%y", "%d-%m-%y", "%d.%m.%y"];

const MONTH_FIRST_DATES: &[&str] = &["%m/%d/%Y", "%m-%d-%Y", "%m.%d.%Y"];

const MONTH_FIRST_SHORT_YEAR_DATES: &[&str] = &["%m/%d/%y", "%m-%d-%y", "%m.%d.%y"];

const TIME_FORMATS: &[&str] = &[
    "%H:%M:%S%.f",
    "%H:%M:%S",
    "%H:%M",
    "%I:%M:%S %p",
    "%I:%M %p",
];

/// Date layouts worth trying for `value`, most specific first.
fn candidate_date_formats(value: &str, day_first: bool) -> Vec<&'static str> {
    let leading_digits = value.chars().take_while(char::is_ascii_digit).count();
    let date_part = value.split_whitespace().next().unwrap_or(value);
    let short_year = date_part
        .rsplit(['/', '-', '.'])
        .next()
        .is_some_and(|segment| segment.len() == 2);

    let (day_formats, month_formats) = if short_year {
        (DAY_FIRST_SHORT_YEAR_DATES, MONTH_FIRST_SHORT_YEAR_DATES)
    } else {
        (DAY_FIRST_DATES, MONTH_FIRST_DATES)
    };
    let (preferred, fallback) = if day_first {
        (day_formats, month_formats)
    } else {
        (month_formats, day_formats)
    };

    let mut formats = Vec::new();
    if leading_digits == 4 || leading_digits == 8 {
        formats.extend_from_slice(YEAR_FIRST_DATES);
    }
    formats.extend_from_slice(NAMED_MONTH_DATES);
    formats.extend_from_slice(preferred);
    formats.extend_from_slice(fallback);
    formats
}

fn parse_naive_datetime(value: &str, date_formats: &[&str]) -> Option<NaiveDateTime> {
    date_formats.iter().find_map(|date_format| {
        let iso = date_format.starts_with("%Y");
        TIME_FORMATS.iter().find_map(|time_format| {
            NaiveDateTime::parse_from_str(value, &format!("{} {}", date_format, time_format))
                .ok()
                .or_else(|| {
                    iso.then(|| {
                        NaiveDateTime::parse_from_str(
                            value,
                            &format!("{}T{}", date_format, time_format),
                        )
                        .ok()
                    })
                    .flatten()
                })
        })
    })
}

fn parse_naive_date(value: &str, date_formats: &[&str]) -> Option<NaiveDate> {
    date_formats
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

fn parse_naive_time(value: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(value, format).ok())
}

/// Seconds since the epoch, or milliseconds once the magnitude reaches 10^12.
fn epoch_to_datetime(raw: f64) -> Option<NaiveDateTime> {
    if !raw.is_finite() {
        return None;
    }

    let millis = if raw.abs() >= 1_000_000_000_000_f64 {
        raw.round() as i64
    } else {
        (raw * 1000.0).round() as i64
    };
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.naive_utc())
}

// --- Numeric ---

fn to_integer(value: &CellValue) -> CellValue {
    let parsed = match value {
        CellValue::Integer(v) => Some(*v),
        CellValue::Float(v) => float_to_integer(*v),
        CellValue::Boolean(v) => Some(i64::from(*v)),
        CellValue::Text(raw) => parse_integer_text(raw),
        _ => None,
    };
    CellValue::Integer(parsed.unwrap_or(0))
}

fn parse_integer_text(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().and_then(float_to_integer))
}

fn float_to_integer(value: f64) -> Option<i64> {
    if value.is_finite() {
        Some(value.trunc() as i64)
    } else {
        None
    }
}

fn to_float(value: &CellValue) -> CellValue {
    let parsed = match value {
        CellValue::Float(v) => Some(*v),
        CellValue::Integer(v) => Some(*v as f64),
        CellValue::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
        CellValue::Text(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.map(CellValue::Float).unwrap_or(CellValue::Null)
}

// --- Boolean ---

fn to_boolean(value: &CellValue) -> CellValue {
    let parsed = match value {
        CellValue::Boolean(v) => Some(*v),
        CellValue::Integer(v) => Some(*v != 0),
        CellValue::Float(v) => Some(v.is_finite() && *v != 0.0),
        CellValue::Text(raw) => parse_boolean_text(raw).or_else(|| {
            raw.trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| v != 0.0)
        }),
        _ => None,
    };
    CellValue::Boolean(parsed.unwrap_or(false))
}

pub(crate) fn parse_boolean_text(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" | "s" | "sim" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" | "nao" | "não" => Some(false),
        _ => None,
    }
}

// --- Text ---

fn to_text(value: CellValue) -> CellValue {
    match value {
        CellValue::Null | CellValue::Text(_) => value,
        CellValue::Float(v) if !v.is_finite() => CellValue::Float(v),
        other => CellValue::Text(other.to_string()),
    }
}
