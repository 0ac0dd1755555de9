//! Row normalization
//!
//! Cleans a loaded [`Table`] in place before upload. The steps run in a fixed
//! order over every row:
//!
//! 1. trim whitespace from text values
//! 2. unify sentinel values (missing, not-a-time, infinities) into null
//! 3. null out timestamp values shorter than 10 characters
//! 4. reformat date-only values as `YYYY-MM-DD`, null when unparseable
//! 5. backfill null `createdAt` with the run time
//! 6. overwrite `updatedAt` with the run time
//! 7. give every null `id` a fresh UUID, then drop rows still without one
//!
//! Configured columns that are absent from the table are skipped.

use crate::config::ColumnRoles;
use crate::dates::{format_date, parse_calendar_date, timestamp_text};
use chrono::{DateTime, Utc};
use compsync_common::types::{ColumnKind, Table, Value};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Minimum length of a timestamp string worth keeping (`YYYY-MM-DD`)
pub const MIN_TIMESTAMP_LEN: usize = 10;

/// Counters describing what a normalization pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub rows_in: usize,
    pub rows_out: usize,
    pub values_trimmed: usize,
    pub values_nulled: usize,
    pub timestamps_rejected: usize,
    pub dates_reformatted: usize,
    pub dates_rejected: usize,
    pub created_at_backfilled: usize,
    pub ids_generated: usize,
    pub rows_dropped: usize,
}

/// Applies the cleaning steps for one set of column roles
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    roles: ColumnRoles,
}

impl Normalizer {
    pub fn new(roles: ColumnRoles) -> Self {
        Self { roles }
    }

    /// Normalize using the current time for `createdAt`/`updatedAt`
    pub fn normalize(&self, table: &mut Table) -> NormalizeReport {
        self.normalize_at(table, Utc::now())
    }

    /// Normalize with a fixed run time; every stamped row gets exactly `now`
    pub fn normalize_at(&self, table: &mut Table, now: DateTime<Utc>) -> NormalizeReport {
        let mut report = NormalizeReport {
            rows_in: table.len(),
            ..Default::default()
        };
        let stamp = timestamp_text(now);

        report.values_trimmed = trim_text(table);
        report.values_nulled = unify_nulls(table);

        for index in self.role_columns(table, &self.roles.timestamps, ColumnKind::Timestamp) {
            report.timestamps_rejected += filter_short_timestamps(table, index);
        }

        for index in self.role_columns(table, &self.roles.dates, ColumnKind::Date) {
            let (reformatted, rejected) = reformat_dates(table, index);
            report.dates_reformatted += reformatted;
            report.dates_rejected += rejected;
        }

        if let Some(index) = self.role_column(table, &self.roles.created_at, ColumnKind::Timestamp)
        {
            report.created_at_backfilled = fill_nulls(table, index, || Value::text(&stamp));
        }

        if let Some(index) = self.role_column(table, &self.roles.updated_at, ColumnKind::Timestamp)
        {
            for row in table.rows_mut() {
                if let Some(cell) = row.get_mut(index) {
                    *cell = Value::text(&stamp);
                }
            }
        }

        if let Some(index) = self.role_column(table, &self.roles.identifier, ColumnKind::Identifier)
        {
            report.ids_generated = assure_identifiers(table, index);
            report.rows_dropped = table.retain_rows(|row| row.get(index).is_some_and(has_identifier));
            if report.rows_dropped > 0 {
                warn!(dropped = report.rows_dropped, "Dropped rows without an identifier");
            }
        }

        report.rows_out = table.len();

        info!(
            rows = report.rows_out,
            trimmed = report.values_trimmed,
            nulled = report.values_nulled,
            timestamps_rejected = report.timestamps_rejected,
            dates_reformatted = report.dates_reformatted,
            dates_rejected = report.dates_rejected,
            created_at_backfilled = report.created_at_backfilled,
            ids_generated = report.ids_generated,
            "Normalized rows"
        );

        report
    }

    fn role_columns(&self, table: &Table, names: &[String], expected: ColumnKind) -> Vec<usize> {
        names
            .iter()
            .filter_map(|name| self.role_column(table, name, expected))
            .collect()
    }

    /// Index of a role column, warning when its loaded kind disagrees with the role
    fn role_column(&self, table: &Table, name: &str, expected: ColumnKind) -> Option<usize> {
        let Some(index) = table.column_index(name) else {
            debug!(column = name, "Configured column not present, skipping");
            return None;
        };

        let kind = table.columns()[index].kind;
        if kind != expected {
            warn!(column = name, loaded = %kind, expected = %expected, "Column kind does not match its role");
        }
        Some(index)
    }
}

fn trim_text(table: &mut Table) -> usize {
    let mut trimmed = 0;
    for row in table.rows_mut() {
        for cell in row.cells_mut() {
            if let Value::Text(s) = cell {
                let t = s.trim();
                if t.len() != s.len() {
                    *s = t.to_string();
                    trimmed += 1;
                }
            }
        }
    }
    trimmed
}

fn unify_nulls(table: &mut Table) -> usize {
    let mut nulled = 0;
    for row in table.rows_mut() {
        for cell in row.cells_mut() {
            if cell.is_sentinel() {
                *cell = Value::Null;
                nulled += 1;
            }
        }
    }
    nulled
}

fn filter_short_timestamps(table: &mut Table, index: usize) -> usize {
    let mut rejected = 0;
    for row in table.rows_mut() {
        let Some(cell) = row.get_mut(index) else {
            continue;
        };
        let keep = match cell {
            Value::Null => true,
            Value::Text(s) => s.chars().count() >= MIN_TIMESTAMP_LEN,
            _ => false,
        };
        if !keep {
            debug!(value = %cell, "Rejected short timestamp");
            *cell = Value::Null;
            rejected += 1;
        }
    }
    rejected
}

fn reformat_dates(table: &mut Table, index: usize) -> (usize, usize) {
    let mut reformatted = 0;
    let mut rejected = 0;
    for row in table.rows_mut() {
        let Some(cell) = row.get_mut(index) else {
            continue;
        };
        let next = match cell {
            Value::Null => Value::Null,
            Value::Text(s) => match parse_calendar_date(s) {
                Ok(date) => {
                    reformatted += 1;
                    Value::Text(format_date(date))
                },
                Err(e) => {
                    debug!(error = %e, "Date value set to null");
                    rejected += 1;
                    Value::Null
                },
            },
            _ => {
                rejected += 1;
                Value::Null
            },
        };
        *cell = next;
    }
    (reformatted, rejected)
}

fn fill_nulls<F>(table: &mut Table, index: usize, mut fill: F) -> usize
where
    F: FnMut() -> Value,
{
    let mut filled = 0;
    for row in table.rows_mut() {
        if let Some(cell) = row.get_mut(index) {
            if cell.is_absent() {
                *cell = fill();
                filled += 1;
            }
        }
    }
    filled
}

fn has_identifier(value: &Value) -> bool {
    match value {
        Value::Text(s) => !s.is_empty(),
        other => !other.is_absent(),
    }
}

/// Null or empty identifiers get a new v4 UUID
fn assure_identifiers(table: &mut Table, index: usize) -> usize {
    let mut generated = 0;
    for row in table.rows_mut() {
        if let Some(cell) = row.get_mut(index) {
            if !has_identifier(cell) {
                *cell = Value::Text(Uuid::new_v4().to_string());
                generated += 1;
            }
        }
    }
    generated
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::loader::read_csv;
    use chrono::TimeZone;
    use compsync_common::types::Column;
    use std::collections::HashSet;

    fn run_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 14, 9, 26, 53).unwrap()
    }

    fn normalize(csv: &str) -> (Table, NormalizeReport) {
        let mut table = read_csv(csv.as_bytes(), &ColumnRoles::default()).unwrap();
        let report = Normalizer::default().normalize_at(&mut table, run_time());
        (table, report)
    }

    const STAMP: &str = "2024-03-14T09:26:53.000Z";

    #[test]
    fn test_trims_text() {
        let (table, report) = normalize("id,componentType,notes\na,  Panel ,\tedge\t\n");
        assert_eq!(table.value(0, "componentType"), Some(&Value::text("Panel")));
        assert_eq!(table.value(0, "notes"), Some(&Value::text("edge")));
        assert_eq!(report.values_trimmed, 2);
    }

    #[test]
    fn test_sentinels_become_null() {
        let (table, report) = normalize(
            "id,componentsqft,createdAt,status\n\
             a,inf,NaT,NULL\n\
             b,-inf,,\n\
             c,1.5,2024-01-01T00:00:00Z,open\n",
        );
        for row in table.rows() {
            assert!(row.cells().iter().all(|c| !c.is_sentinel()));
        }
        assert_eq!(table.value(0, "componentsqft"), Some(&Value::Null));
        assert_eq!(table.value(1, "componentsqft"), Some(&Value::Null));
        assert_eq!(table.value(2, "componentsqft"), Some(&Value::Float(1.5)));
        assert_eq!(table.value(0, "status"), Some(&Value::Null));
        assert_eq!(report.values_nulled, 6);
    }

    #[test]
    fn test_short_timestamps_rejected() {
        let (table, report) = normalize(
            "id,completedAt\n\
             a,2024-03\n\
             b,2024-03-01\n\
             c,\n",
        );
        assert_eq!(table.value(0, "completedAt"), Some(&Value::Null));
        assert_eq!(table.value(1, "completedAt"), Some(&Value::text("2024-03-01")));
        assert_eq!(table.value(2, "completedAt"), Some(&Value::Null));
        assert_eq!(report.timestamps_rejected, 1);
    }

    #[test]
    fn test_dates_reformatted() {
        let (table, report) = normalize(
            "id,dateshipped,datedelivered\n\
             a,03/14/2024,not a date\n\
             b,,2024-03-20T08:00:00Z\n",
        );
        assert_eq!(table.value(0, "dateshipped"), Some(&Value::text("2024-03-14")));
        assert_eq!(table.value(0, "datedelivered"), Some(&Value::Null));
        assert_eq!(table.value(1, "dateshipped"), Some(&Value::Null));
        assert_eq!(table.value(1, "datedelivered"), Some(&Value::text("2024-03-20")));
        assert_eq!(report.dates_reformatted, 2);
        assert_eq!(report.dates_rejected, 1);
    }

    #[test]
    fn test_created_at_backfilled_only_when_null() {
        let (table, report) = normalize(
            "id,createdAt\n\
             a,2023-12-01T10:00:00.000Z\n\
             b,\n\
             c,bad\n",
        );
        assert_eq!(
            table.value(0, "createdAt"),
            Some(&Value::text("2023-12-01T10:00:00.000Z"))
        );
        assert_eq!(table.value(1, "createdAt"), Some(&Value::text(STAMP)));
        // Rejected by the length filter first, then backfilled
        assert_eq!(table.value(2, "createdAt"), Some(&Value::text(STAMP)));
        assert_eq!(report.created_at_backfilled, 2);
    }

    #[test]
    fn test_updated_at_always_stamped() {
        let (table, _) = normalize(
            "id,updatedAt\n\
             a,2020-01-01T00:00:00.000Z\n\
             b,\n",
        );
        let stamps: HashSet<String> = (0..table.len())
            .map(|i| table.value(i, "updatedAt").unwrap().to_string())
            .collect();
        assert_eq!(stamps.len(), 1);
        assert_eq!(table.value(0, "updatedAt"), Some(&Value::text(STAMP)));
    }

    #[test]
    fn test_missing_ids_generated_and_distinct() {
        let (table, report) = normalize("id,componentId\nkeep-me,C-1\n,C-2\n  ,C-3\nNaN,C-4\n");
        assert_eq!(report.ids_generated, 3);
        assert_eq!(report.rows_dropped, 0);
        assert_eq!(table.value(0, "id"), Some(&Value::text("keep-me")));

        let ids: HashSet<String> = (1..4)
            .map(|i| table.value(i, "id").unwrap().as_text().unwrap().to_string())
            .collect();
        assert_eq!(ids.len(), 3);
        for id in &ids {
            assert!(Uuid::parse_str(id).is_ok());
        }
    }

    #[test]
    fn test_absent_columns_are_skipped() {
        let (table, report) = normalize("componentId,componentType\nC-1, Panel\n");
        assert_eq!(table.columns().len(), 2);
        assert!(table.column("id").is_none());
        assert!(table.column("updatedAt").is_none());
        assert_eq!(report.ids_generated, 0);
        assert_eq!(report.rows_out, 1);
    }

    #[test]
    fn test_identifier_column_with_numeric_kind() {
        // An identifier column loaded as a number can hold a value that is
        // neither text nor null; non-finite ones are unified to null and
        // regenerated, so every row survives.
        let mut table = Table::new(vec![Column::new("id", ColumnKind::Float)]);
        table.push_row(vec![Value::Float(f64::NAN)]);
        table.push_row(vec![Value::Float(3.0)]);

        let report = Normalizer::default().normalize_at(&mut table, run_time());
        assert_eq!(report.rows_out, 2);
        assert_eq!(report.ids_generated, 1);
        assert_eq!(table.value(1, "id"), Some(&Value::Float(3.0)));
    }

    #[test]
    fn test_report_row_counts() {
        let (_, report) = normalize("id\na\nb\n");
        assert_eq!(report.rows_in, 2);
        assert_eq!(report.rows_out, 2);
    }
}
