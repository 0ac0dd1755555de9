//! Text preview of normalized rows

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table as TextTable};
use compsync_common::types::Table;

/// Render the first `limit` rows of the selected columns as a table.
///
/// Columns missing from `table` are skipped. Returns `None` when there is
/// nothing to show.
pub fn render_preview(table: &Table, columns: &[String], limit: usize) -> Option<String> {
    let selected: Vec<(usize, &str)> = columns
        .iter()
        .filter_map(|name| table.column_index(name).map(|idx| (idx, name.as_str())))
        .collect();

    if limit == 0 || selected.is_empty() {
        return None;
    }

    let mut text = TextTable::new();
    text.load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(selected.iter().map(|(_, name)| *name).collect::<Vec<_>>());

    for row in table.rows().iter().take(limit) {
        let cells: Vec<String> = selected
            .iter()
            .map(|(idx, _)| row.get(*idx).map(ToString::to_string).unwrap_or_default())
            .collect();
        text.add_row(cells);
    }

    Some(text.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use compsync_common::types::{Column, ColumnKind, Value};

    fn table(rows: usize) -> Table {
        let mut table = Table::new(vec![
            Column::new("id", ColumnKind::Identifier),
            Column::new("componentType", ColumnKind::Text),
            Column::new("dateshipped", ColumnKind::Date),
        ]);
        for i in 0..rows {
            table.push_row(vec![
                Value::text(format!("row-{}", i)),
                Value::text("Panel"),
                Value::Null,
            ]);
        }
        table
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_preview_selected_columns() {
        let text = render_preview(&table(2), &columns(&["id", "dateshipped", "updatedAt"]), 10)
            .unwrap();
        assert!(text.contains("id"));
        assert!(text.contains("dateshipped"));
        assert!(!text.contains("updatedAt"));
        assert!(!text.contains("componentType"));
        assert!(text.contains("row-1"));
        assert!(text.contains("NULL"));
    }

    #[test]
    fn test_preview_limits_rows() {
        let text = render_preview(&table(15), &columns(&["id"]), 10).unwrap();
        assert!(text.contains("row-9"));
        assert!(!text.contains("row-10"));
    }

    #[test]
    fn test_preview_nothing_to_show() {
        assert!(render_preview(&table(3), &columns(&["updatedAt"]), 10).is_none());
        assert!(render_preview(&table(3), &columns(&["id"]), 0).is_none());
    }
}
