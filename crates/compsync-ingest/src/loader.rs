//! CSV source loader
//!
//! Reads a CSV file with a header row into a [`Table`]. Each column gets a
//! [`ColumnKind`] once, at load time: configured names are forced to their
//! role's kind, everything else is inferred from the column's non-missing
//! cells. Empty cells and the usual spreadsheet "no data" spellings load as
//! [`Value::Missing`]; `NaT` in temporal columns loads as [`Value::NotATime`].

use crate::config::ColumnRoles;
use compsync_common::types::{Column, ColumnKind, Table, Value};
use compsync_common::{Result, SyncError};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Cell spellings read as a missing value (compared after trimming)
const MISSING_MARKERS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NULL", "null", "NaN", "-NaN", "nan", "-nan", "None", "<NA>", "#N/A",
    "#N/A N/A", "#NA", "1.#IND", "-1.#IND", "1.#QNAN", "-1.#QNAN",
];

/// Not-a-time marker, only meaningful in timestamp and date columns
const NOT_A_TIME: &str = "NaT";

/// Load a CSV file from disk
pub fn load_csv(path: impl AsRef<Path>, roles: &ColumnRoles) -> Result<Table> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(SyncError::load(path, "file not found"));
    }

    let file = std::fs::File::open(path).map_err(|e| SyncError::load(path, e.to_string()))?;
    let table = read_csv(file, roles).map_err(|e| match e {
        SyncError::Load { message, .. } => SyncError::load(path, message),
        other => SyncError::load(path, other.to_string()),
    })?;

    info!(
        path = %path.display(),
        rows = table.len(),
        columns = table.columns().len(),
        "Loaded source file"
    );
    Ok(table)
}

/// Read CSV data from any reader
pub fn read_csv<R: Read>(reader: R, roles: &ColumnRoles) -> Result<Table> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(SyncError::load("<input>", "missing header row"));
    }
    let names = dedupe_headers(&headers);

    let mut raw_rows: Vec<StringRecord> = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| SyncError::load("<input>", malformed_message(&e)))?;
        raw_rows.push(record);
    }

    let columns: Vec<Column> = names
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let kind = roles
                .kind_for(&name)
                .unwrap_or_else(|| infer_kind(raw_rows.iter().filter_map(|r| r.get(idx))));
            debug!(column = %name, kind = %kind, "Column kind");
            Column::new(name, kind)
        })
        .collect();

    let kinds: Vec<ColumnKind> = columns.iter().map(|c| c.kind).collect();
    let mut table = Table::new(columns);

    for record in &raw_rows {
        let cells = kinds
            .iter()
            .enumerate()
            .map(|(idx, kind)| parse_cell(record.get(idx).unwrap_or(""), *kind))
            .collect();
        table.push_row(cells);
    }

    Ok(table)
}

fn malformed_message(err: &csv::Error) -> String {
    match err.kind() {
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => {
            let line = pos.as_ref().map(|p| p.line()).unwrap_or_default();
            format!(
                "malformed record on line {}: expected {} fields, found {}",
                line, expected_len, len
            )
        },
        _ => err.to_string(),
    }
}

/// Repeated header names become `name`, `name.1`, `name.2`, ...
fn dedupe_headers(headers: &StringRecord) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::with_capacity(headers.len());

    for header in headers.iter() {
        let mut name = header.to_string();
        if let Some(&used) = seen.get(header) {
            let mut suffix = used;
            loop {
                suffix += 1;
                name = format!("{}.{}", header, suffix);
                if !seen.contains_key(&name) {
                    break;
                }
            }
            seen.insert(header.to_string(), suffix);
        }
        seen.entry(name.clone()).or_insert(0);
        names.push(name);
    }

    names
}

fn is_missing_marker(raw: &str) -> bool {
    MISSING_MARKERS.contains(&raw.trim())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Pick the narrowest kind every non-missing cell fits
fn infer_kind<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnKind {
    let mut all_bool = true;
    let mut all_int = true;
    let mut all_float = true;
    let mut any = false;

    for cell in cells.filter(|c| !is_missing_marker(c)) {
        any = true;
        let trimmed = cell.trim();
        all_bool &= parse_bool(trimmed).is_some();
        all_int &= trimmed.parse::<i64>().is_ok();
        all_float &= trimmed.parse::<f64>().is_ok();

        if !all_bool && !all_float {
            return ColumnKind::Text;
        }
    }

    match (any, all_bool, all_int, all_float) {
        (false, ..) => ColumnKind::Text,
        (true, true, ..) => ColumnKind::Boolean,
        (true, false, true, _) => ColumnKind::Integer,
        (true, false, false, true) => ColumnKind::Float,
        _ => ColumnKind::Text,
    }
}

fn parse_cell(raw: &str, kind: ColumnKind) -> Value {
    if is_missing_marker(raw) {
        return Value::Missing;
    }

    let trimmed = raw.trim();
    match kind {
        ColumnKind::Boolean => parse_bool(trimmed).map_or(Value::Missing, Value::Bool),
        ColumnKind::Integer => trimmed.parse().map_or(Value::Missing, Value::Integer),
        ColumnKind::Float => trimmed.parse().map_or(Value::Missing, Value::Float),
        kind if kind.is_temporal() && trimmed == NOT_A_TIME => Value::NotATime,
        _ => Value::Text(raw.to_string()),
    }
}
