//! Compsync Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging and error handling for the compsync workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`SyncError`] and the [`Result`] alias
//! - **Types**: the in-memory table model ([`types::Table`], [`types::Value`])
//! - **Logging**: `tracing` subscriber setup shared by all binaries
//!
//! # Example
//!
//! ```no_run
//! use compsync_common::types::{Column, ColumnKind, Table, Value};
//!
//! let mut table = Table::new(vec![Column::new("id", ColumnKind::Identifier)]);
//! table.push_row(vec![Value::Null]);
//! assert_eq!(table.len(), 1);
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SyncError};
