//! Compsync Ingest Library
//!
//! Loads the component export CSV, cleans it and upserts it into a
//! PostgREST-style table in batches.
//!
//! # Stages
//!
//! - **Load**: [`loader`] reads the CSV into a typed [`Table`](compsync_common::types::Table)
//! - **Normalize**: [`normalize`] trims, nulls sentinels, fixes dates and fills ids
//! - **Preview / Export**: [`preview`] and [`export`] show or save the cleaned rows
//! - **Upload**: [`upload`] posts the rows in ordered batches
//!
//! # Example
//!
//! ```no_run
//! use compsync_ingest::{pipeline, SyncConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SyncConfig::from_env()?;
//!     let summary = pipeline::run(&config).await?;
//!     println!("{} rows normalized", summary.normalize.rows_out);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod dates;
pub mod export;
pub mod loader;
pub mod normalize;
pub mod pipeline;
pub mod preview;
pub mod upload;

pub use config::{ColumnRoles, SyncConfig};
pub use normalize::{NormalizeReport, Normalizer};
pub use pipeline::RunSummary;
pub use upload::{BatchOutcome, BatchResult, BatchUploader, UploadReport};
