//! Sync configuration
//!
//! Everything a run needs is carried in [`SyncConfig`] and passed into
//! [`crate::pipeline::run`]. It can be assembled with the builder, read from the
//! environment, or filled in by the CLI.

use compsync_common::types::ColumnKind;
use compsync_common::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

// ============================================================================
// Configuration Constants
// ============================================================================

pub const DEFAULT_SOURCE_PATH: &str = "data/Component_rows.csv";

/// Remote table the rows are upserted into.
pub const DEFAULT_TABLE_NAME: &str = "Component";

/// Rows per upsert request.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Rows shown in the post-normalization preview.
pub const DEFAULT_PREVIEW_ROWS: usize = 10;

pub const ENV_ENDPOINT_URL: &str = "SUPABASE_URL";
pub const ENV_API_KEY: &str = "SUPABASE_API_KEY";
pub const ENV_SOURCE_PATH: &str = "COMPSYNC_SOURCE";
pub const ENV_TABLE_NAME: &str = "COMPSYNC_TABLE";
pub const ENV_BATCH_SIZE: &str = "COMPSYNC_BATCH_SIZE";
pub const ENV_TIMEOUT_SECS: &str = "COMPSYNC_TIMEOUT_SECS";
pub const ENV_ON_CONFLICT: &str = "COMPSYNC_ON_CONFLICT";

/// Column names that receive special treatment during load and normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRoles {
    /// Timestamp columns, kept only when at least 10 characters long
    pub timestamps: Vec<String>,

    /// Date-only columns, reformatted to `YYYY-MM-DD`
    pub dates: Vec<String>,

    /// Row identifier, backfilled with a UUID when null
    pub identifier: String,

    /// Creation timestamp, backfilled with the run time when null
    pub created_at: String,

    /// Update timestamp, overwritten with the run time on every row
    pub updated_at: String,
}

impl Default for ColumnRoles {
    fn default() -> Self {
        Self {
            timestamps: vec![
                "createdAt".to_string(),
                "updatedAt".to_string(),
                "completedAt".to_string(),
            ],
            dates: vec!["dateshipped".to_string(), "datedelivered".to_string()],
            identifier: "id".to_string(),
            created_at: "createdAt".to_string(),
            updated_at: "updatedAt".to_string(),
        }
    }
}

impl ColumnRoles {
    /// Kind forced by name, or `None` when the column's kind is inferred from data
    pub fn kind_for(&self, name: &str) -> Option<ColumnKind> {
        if name == self.identifier {
            Some(ColumnKind::Identifier)
        } else if self.timestamps.iter().any(|c| c == name)
            || name == self.created_at
            || name == self.updated_at
        {
            Some(ColumnKind::Timestamp)
        } else if self.dates.iter().any(|c| c == name) {
            Some(ColumnKind::Date)
        } else {
            None
        }
    }
}

/// Configuration for one sync run
#[derive(Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// CSV file to read
    pub source_path: PathBuf,

    /// Base URL of the REST service, e.g. `https://xyz.supabase.co`
    pub endpoint_url: String,

    /// API key, sent both as `apikey` and as the bearer token
    pub api_key: String,

    pub table_name: String,

    pub batch_size: usize,

    pub timeout_secs: u64,

    /// Conflict target(s) passed as `on_conflict`, e.g. "id"
    #[serde(default)]
    pub on_conflict: Option<String>,

    pub preview_rows: usize,

    /// Columns shown in the preview; absent ones are skipped
    pub preview_columns: Vec<String>,

    /// Write normalized records as JSON Lines here
    #[serde(default)]
    pub export_path: Option<PathBuf>,

    /// Stop after normalization, preview and export
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub show_progress: bool,

    #[serde(default)]
    pub columns: ColumnRoles,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let columns = ColumnRoles::default();
        let mut preview_columns = vec![columns.identifier.clone()];
        preview_columns.extend(columns.timestamps.iter().cloned());
        preview_columns.extend(columns.dates.iter().cloned());

        Self {
            source_path: PathBuf::from(DEFAULT_SOURCE_PATH),
            endpoint_url: String::new(),
            api_key: String::new(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            on_conflict: None,
            preview_rows: DEFAULT_PREVIEW_ROWS,
            preview_columns,
            export_path: None,
            dry_run: false,
            show_progress: false,
            columns,
        }
    }
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("source_path", &self.source_path)
            .field("endpoint_url", &self.endpoint_url)
            .field("api_key", &"<redacted>")
            .field("table_name", &self.table_name)
            .field("batch_size", &self.batch_size)
            .field("timeout_secs", &self.timeout_secs)
            .field("on_conflict", &self.on_conflict)
            .field("preview_rows", &self.preview_rows)
            .field("export_path", &self.export_path)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl SyncConfig {
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Load config from environment variables
    ///
    /// `SUPABASE_URL` and `SUPABASE_API_KEY` are required; the `COMPSYNC_*`
    /// variables override the defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self {
            endpoint_url: require_env(ENV_ENDPOINT_URL)?,
            api_key: require_env(ENV_API_KEY)?,
            ..Self::default()
        };

        if let Ok(path) = std::env::var(ENV_SOURCE_PATH) {
            config.source_path = PathBuf::from(path);
        }

        if let Ok(table) = std::env::var(ENV_TABLE_NAME) {
            config.table_name = table;
        }

        if let Ok(size) = std::env::var(ENV_BATCH_SIZE) {
            config.batch_size = size.trim().parse().map_err(|_| {
                SyncError::config(format!("{} must be a positive integer, got '{}'", ENV_BATCH_SIZE, size))
            })?;
        }

        if let Ok(secs) = std::env::var(ENV_TIMEOUT_SECS) {
            config.timeout_secs = secs.trim().parse().map_err(|_| {
                SyncError::config(format!("{} must be a number of seconds, got '{}'", ENV_TIMEOUT_SECS, secs))
            })?;
        }

        if let Ok(target) = std::env::var(ENV_ON_CONFLICT) {
            config.on_conflict = Some(target).filter(|t| !t.trim().is_empty());
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot possibly run.
    ///
    /// A dry run never contacts the endpoint, so it needs no URL or key.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(SyncError::config("batch size must be at least 1"));
        }

        if self.dry_run {
            return Ok(());
        }

        if self.endpoint_url.trim().is_empty() {
            return Err(SyncError::config(format!(
                "endpoint URL is required (set {} or pass --endpoint-url)",
                ENV_ENDPOINT_URL
            )));
        }

        if self.api_key.trim().is_empty() {
            return Err(SyncError::config(format!(
                "API key is required (set {} or pass --api-key)",
                ENV_API_KEY
            )));
        }

        if self.table_name.trim().is_empty() {
            return Err(SyncError::config("table name must not be empty"));
        }

        self.upsert_url()?;
        Ok(())
    }

    /// `{endpoint_url}/rest/v1/{table_name}`, plus `on_conflict` when set
    pub fn upsert_url(&self) -> Result<Url> {
        let base = self.endpoint_url.trim().trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/rest/v1/{}", base, self.table_name.trim()))
            .map_err(|e| SyncError::config(format!("invalid endpoint URL '{}': {}", base, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(SyncError::config(format!(
                "endpoint URL must be http or https, got '{}'",
                url.scheme()
            )));
        }

        if let Some(ref target) = self.on_conflict {
            url.query_pairs_mut().append_pair("on_conflict", target);
        }

        Ok(url)
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| SyncError::config(format!("{} is not set", name)))
}

/// Builder for SyncConfig
#[derive(Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    pub fn source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.source_path = path.into();
        self
    }

    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn table_name(mut self, table: impl Into<String>) -> Self {
        self.config.table_name = table.into();
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn on_conflict(mut self, target: Option<String>) -> Self {
        self.config.on_conflict = target;
        self
    }

    pub fn preview_rows(mut self, rows: usize) -> Self {
        self.config.preview_rows = rows;
        self
    }

    pub fn preview_columns(mut self, columns: Vec<String>) -> Self {
        self.config.preview_columns = columns;
        self
    }

    pub fn export_path(mut self, path: Option<PathBuf>) -> Self {
        self.config.export_path = path;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.config.show_progress = show;
        self
    }

    pub fn columns(mut self, columns: ColumnRoles) -> Self {
        self.config.columns = columns;
        self
    }

    /// Validate and return the config
    pub fn build(self) -> Result<SyncConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
