//! Compsync - component CSV to REST table sync

use anyhow::Result;
use clap::Parser;
use compsync_common::logging::{init_logging, LogConfig, LogLevel};
use compsync_ingest::config::{
    SyncConfig, DEFAULT_BATCH_SIZE, DEFAULT_PREVIEW_ROWS, DEFAULT_SOURCE_PATH, DEFAULT_TABLE_NAME,
    DEFAULT_TIMEOUT_SECS, ENV_API_KEY, ENV_BATCH_SIZE, ENV_ENDPOINT_URL, ENV_ON_CONFLICT,
    ENV_SOURCE_PATH, ENV_TABLE_NAME, ENV_TIMEOUT_SECS,
};
use compsync_ingest::pipeline;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "compsync")]
#[command(author, version, about = "Normalize the component CSV export and upsert it over REST")]
struct Cli {
    /// CSV file to load
    #[arg(short, long, env = ENV_SOURCE_PATH, default_value = DEFAULT_SOURCE_PATH)]
    source: PathBuf,

    /// Base URL of the REST service
    #[arg(long, env = ENV_ENDPOINT_URL, default_value = "")]
    endpoint_url: String,

    /// API key sent as `apikey` and bearer token
    #[arg(long, env = ENV_API_KEY, default_value = "", hide_env_values = true, hide_default_value = true)]
    api_key: String,

    /// Target table
    #[arg(short, long, env = ENV_TABLE_NAME, default_value = DEFAULT_TABLE_NAME)]
    table: String,

    /// Rows per upsert request
    #[arg(short, long, env = ENV_BATCH_SIZE, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Per-request timeout in seconds
    #[arg(long, env = ENV_TIMEOUT_SECS, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Conflict target column(s), e.g. "id"
    #[arg(long, env = ENV_ON_CONFLICT)]
    on_conflict: Option<String>,

    /// Rows shown in the preview (0 disables it)
    #[arg(long, default_value_t = DEFAULT_PREVIEW_ROWS)]
    preview_rows: usize,

    /// Also write the normalized rows as JSON Lines
    #[arg(long)]
    export: Option<PathBuf>,

    /// Load, normalize and preview without uploading
    #[arg(long)]
    dry_run: bool,

    /// Show a progress bar while uploading
    #[arg(long)]
    progress: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn sync_config(&self) -> compsync_common::Result<SyncConfig> {
        SyncConfig::builder()
            .source_path(&self.source)
            .endpoint_url(&self.endpoint_url)
            .api_key(&self.api_key)
            .table_name(&self.table)
            .batch_size(self.batch_size)
            .timeout_secs(self.timeout_secs)
            .on_conflict(self.on_conflict.clone().filter(|t| !t.trim().is_empty()))
            .preview_rows(self.preview_rows)
            .export_path(self.export.clone())
            .dry_run(self.dry_run)
            .show_progress(self.progress)
            .build()
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("compsync")
        .build();

    // Environment variables take precedence over flags
    let _guard = match log_config.merge_env().and_then(|c| init_logging(&c)) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        },
    };

    match execute(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Sync failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        },
    }
}

async fn execute(cli: &Cli) -> Result<()> {
    let config = cli.sync_config()?;
    info!(config = ?config, "Starting sync");

    let summary = pipeline::run(&config).await?;

    match &summary.upload {
        Some(report) => info!(
            rows = summary.normalize.rows_out,
            batches = report.batches.len(),
            failed = report.failed(),
            "Sync complete"
        ),
        None => info!(rows = summary.normalize.rows_out, "Dry run complete"),
    }

    Ok(())
}
