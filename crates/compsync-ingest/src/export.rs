//! JSON Lines export of normalized records

use compsync_common::types::Table;
use compsync_common::Result;
use std::path::Path;
use tracing::info;

/// Write every row of `table` to `path`, one JSON object per line.
///
/// Objects have the same shape as the upsert request body.
pub fn write_json_lines(path: impl AsRef<Path>, table: &Table) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    serde_jsonlines::write_json_lines(path, table.records())?;

    info!(path = %path.display(), rows = table.len(), "Exported normalized rows");
    Ok(())
}
