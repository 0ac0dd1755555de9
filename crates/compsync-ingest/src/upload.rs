//! Batched upsert over REST
//!
//! Rows are sent in contiguous, order-preserving batches, one `POST` per batch,
//! each awaited before the next is sent. A rejected batch is logged with its
//! row range and response body and the run moves on: there is no retry and no
//! rollback, so a partial failure leaves whichever batches succeeded in place.

use crate::config::SyncConfig;
use compsync_common::types::{Record, Table};
use compsync_common::{Result, SyncError};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use std::ops::Range;
use std::time::Duration;
use tracing::{error, info, warn};
use url::Url;

/// Header value that turns an insert into an upsert on key conflicts
pub const PREFER_MERGE_DUPLICATES: &str = "resolution=merge-duplicates";

/// What happened to one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum BatchOutcome {
    Success {
        status: u16,
    },
    /// `status` is `None` when no response arrived (connection or timeout error)
    Failure {
        status: Option<u16>,
        body: String,
    },
}

/// Outcome of one batch together with its position in the row sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    /// Zero-based batch number
    pub index: usize,
    /// First row of the batch
    pub start: usize,
    /// One past the last row of the batch
    pub end: usize,
    pub outcome: BatchOutcome,
}

impl BatchResult {
    pub fn rows(&self) -> usize {
        self.end - self.start
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Success { .. })
    }

    /// The rejection as an error value, for callers that want one
    pub fn to_error(&self) -> Option<SyncError> {
        match &self.outcome {
            BatchOutcome::Success { .. } => None,
            BatchOutcome::Failure {
                status: Some(status),
                body,
            } => Some(SyncError::Upload {
                start: self.start,
                end: self.end,
                status: *status,
                body: body.clone(),
            }),
            BatchOutcome::Failure { status: None, body } => Some(SyncError::network(format!(
                "batch {}..{}: {}",
                self.start, self.end, body
            ))),
        }
    }
}

/// Per-batch results of one upload run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub batches: Vec<BatchResult>,
}

impl UploadReport {
    pub fn succeeded(&self) -> usize {
        self.batches.iter().filter(|b| b.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.batches.len() - self.succeeded()
    }

    /// Rows in batches the endpoint accepted
    pub fn rows_accepted(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| b.is_success())
            .map(BatchResult::rows)
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchResult> {
        self.batches.iter().filter(|b| !b.is_success())
    }
}

/// Split `total` rows into contiguous ranges of at most `batch_size`.
///
/// A `batch_size` of zero is treated as one.
pub fn plan_batches(total: usize, batch_size: usize) -> Vec<Range<usize>> {
    let size = batch_size.max(1);
    (0..total)
        .step_by(size)
        .map(|start| start..(start + size).min(total))
        .collect()
}

/// Sends normalized rows to `{endpoint}/rest/v1/{table}`
pub struct BatchUploader {
    client: Client,
    url: Url,
    api_key: String,
    batch_size: usize,
    show_progress: bool,
}

impl BatchUploader {
    /// Build an uploader from a validated config
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SyncError::network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.upsert_url()?,
            api_key: config.api_key.clone(),
            batch_size: config.batch_size,
            show_progress: config.show_progress,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Upload every row of `table`, one batch at a time.
    ///
    /// Never fails as a whole: each batch's outcome is recorded in the report.
    pub async fn upload(&self, table: &Table) -> UploadReport {
        let records = table.records();
        let plan = plan_batches(records.len(), self.batch_size);

        info!(
            url = %self.url,
            rows = records.len(),
            batches = plan.len(),
            batch_size = self.batch_size,
            "Uploading rows"
        );

        let progress = self.progress_bar(plan.len() as u64);
        let mut report = UploadReport::default();

        for (index, range) in plan.into_iter().enumerate() {
            let outcome = self.send_batch(&records[range.clone()]).await;

            progress.suspend(|| match &outcome {
                BatchOutcome::Success { status } => info!(
                    batch = index + 1,
                    start = range.start,
                    end = range.end,
                    status,
                    "Batch {}..{} upserted successfully",
                    range.start,
                    range.end
                ),
                BatchOutcome::Failure { status, body } => error!(
                    batch = index + 1,
                    start = range.start,
                    end = range.end,
                    status = ?status,
                    "Error on batch {}..{}: {}",
                    range.start,
                    range.end,
                    body
                ),
            });
            progress.inc(1);

            report.batches.push(BatchResult {
                index,
                start: range.start,
                end: range.end,
                outcome,
            });
        }

        progress.finish_and_clear();

        if report.failed() > 0 {
            warn!(
                failed = report.failed(),
                succeeded = report.succeeded(),
                "Some batches were rejected"
            );
        }

        report
    }

    async fn send_batch(&self, batch: &[Record<'_>]) -> BatchOutcome {
        let body = match serde_json::to_vec(batch) {
            Ok(body) => body,
            Err(e) => {
                return BatchOutcome::Failure {
                    status: None,
                    body: format!("failed to serialize batch: {}", e),
                }
            },
        };

        let response = self
            .client
            .post(self.url.clone())
            .header("apikey", &self.api_key)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", PREFER_MERGE_DUPLICATES)
            .body(body)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                return BatchOutcome::Failure {
                    status: None,
                    body: e.to_string(),
                }
            },
        };

        let status = response.status().as_u16();
        if status < 400 {
            return BatchOutcome::Success { status };
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<unreadable response body: {}>", e));
        BatchOutcome::Failure {
            status: Some(status),
            body,
        }
    }

    fn progress_bar(&self, batches: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(batches);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} batches ({eta})")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_batches_covers_all_rows_in_order() {
        for (total, size) in [(0, 50), (1, 50), (50, 50), (51, 50), (120, 50), (7, 3), (5, 1)] {
            let plan = plan_batches(total, size);
            assert_eq!(plan.len(), total.div_ceil(size), "{total}/{size}");

            let mut next = 0;
            for range in &plan {
                assert_eq!(range.start, next);
                assert!(range.len() <= size && !range.is_empty());
                next = range.end;
            }
            assert_eq!(next, total);
        }
    }

    #[test]
    fn test_plan_batches_last_batch_smaller() {
        assert_eq!(plan_batches(120, 50), vec![0..50, 50..100, 100..120]);
    }

    #[test]
    fn test_plan_batches_zero_size() {
        assert_eq!(plan_batches(2, 0), vec![0..1, 1..2]);
    }

    fn result(start: usize, end: usize, outcome: BatchOutcome) -> BatchResult {
        BatchResult {
            index: start / 50,
            start,
            end,
            outcome,
        }
    }

    #[test]
    fn test_report_counts() {
        let report = UploadReport {
            batches: vec![
                result(0, 50, BatchOutcome::Success { status: 201 }),
                result(
                    50,
                    100,
                    BatchOutcome::Failure {
                        status: Some(409),
                        body: "duplicate key".to_string(),
                    },
                ),
                result(100, 120, BatchOutcome::Success { status: 201 }),
            ],
        };

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.rows_accepted(), 70);

        let failure = report.failures().next().unwrap();
        let err = failure.to_error().unwrap();
        assert!(matches!(err, SyncError::Upload { start: 50, end: 100, status: 409, .. }));
    }

    #[test]
    fn test_transport_failure_maps_to_network_error() {
        let failed = result(
            0,
            10,
            BatchOutcome::Failure {
                status: None,
                body: "connection refused".to_string(),
            },
        );
        assert!(matches!(failed.to_error(), Some(SyncError::Network(_))));
        assert!(result(0, 10, BatchOutcome::Success { status: 200 }).to_error().is_none());
    }

    #[test]
    fn test_uploader_targets_table_endpoint() {
        let config = SyncConfig::builder()
            .endpoint_url("https://project.supabase.co")
            .api_key("key")
            .batch_size(25)
            .build()
            .unwrap();
        let uploader = BatchUploader::new(&config).unwrap();
        assert_eq!(uploader.url().path(), "/rest/v1/Component");
        assert_eq!(uploader.batch_size(), 25);
    }
}
