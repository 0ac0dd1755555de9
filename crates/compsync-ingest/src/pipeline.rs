//! End-to-end sync run
//!
//! Load, normalize, preview, optionally export, then upload. Configuration,
//! load and client errors abort the run; rejected batches do not.

use crate::config::SyncConfig;
use crate::export::write_json_lines;
use crate::loader::load_csv;
use crate::normalize::{NormalizeReport, Normalizer};
use crate::preview::render_preview;
use crate::upload::{BatchUploader, UploadReport};
use compsync_common::Result;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// What one run did
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub normalize: NormalizeReport,

    /// Rendered preview table, when any preview column was present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,

    /// `None` for a dry run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadReport>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exported: Option<PathBuf>,
}

impl RunSummary {
    /// True when an upload happened and at least one batch was rejected
    pub fn has_failures(&self) -> bool {
        self.upload.as_ref().is_some_and(|u| u.failed() > 0)
    }
}

/// Run one sync with `config`
pub async fn run(config: &SyncConfig) -> Result<RunSummary> {
    config.validate()?;

    // Build the client before touching the file so a bad endpoint fails fast
    let uploader = if config.dry_run {
        None
    } else {
        Some(BatchUploader::new(config)?)
    };

    let mut table = load_csv(&config.source_path, &config.columns)?;

    let normalizer = Normalizer::new(config.columns.clone());
    let normalize = normalizer.normalize(&mut table);

    let preview = render_preview(&table, &config.preview_columns, config.preview_rows);
    if let Some(text) = &preview {
        info!("Preview of normalized rows:\n{}", text);
    }

    let exported = match &config.export_path {
        Some(path) => {
            write_json_lines(path, &table)?;
            Some(path.clone())
        },
        None => None,
    };

    let upload = match uploader {
        Some(uploader) => Some(uploader.upload(&table).await),
        None => {
            info!(rows = table.len(), "Dry run, skipping upload");
            None
        },
    };

    let summary = RunSummary {
        normalize,
        preview,
        upload,
        exported,
    };

    match &summary.upload {
        Some(report) if report.failed() > 0 => warn!(
            batches = report.batches.len(),
            failed = report.failed(),
            rows_accepted = report.rows_accepted(),
            "Upload finished with rejected batches"
        ),
        Some(report) => info!(
            batches = report.batches.len(),
            rows_accepted = report.rows_accepted(),
            "Upload complete"
        ),
        None => {},
    }

    Ok(summary)
}
