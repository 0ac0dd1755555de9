//! End-to-end tests for the compsync binary
//!
//! These tests validate:
//! - Configuration from environment variables
//! - Exit status for rejected batches and fatal errors
//! - Dry run and export

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const CSV: &str = "id,createdAt,updatedAt,dateshipped,componentType\n\
                   a,2024-01-02T03:04:05Z,,2024-03-14,Panel\n\
                   b,,,03/15/2024,Beam\n\
                   c,,,,Column\n";

/// Command with a clean environment rooted in `dir`
fn compsync(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("compsync").unwrap();
    cmd.current_dir(dir)
        .env_clear()
        .env("LOG_OUTPUT", "console")
        .env("LOG_FORMAT", "text")
        .env("LOG_LEVEL", "info");
    cmd
}

fn write_source(dir: &Path) -> std::path::PathBuf {
    let source = dir.join("Component_rows.csv");
    std::fs::write(&source, CSV).unwrap();
    source
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sync_uploads_all_batches() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/Component"))
        .and(header("apikey", "test-key"))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path());

    compsync(dir.path())
        .env("SUPABASE_URL", server.uri())
        .env("SUPABASE_API_KEY", "test-key")
        .env("COMPSYNC_SOURCE", &source)
        .env("COMPSYNC_BATCH_SIZE", "2")
        .assert()
        .success()
        .stdout(predicate::str::contains("Batch 0..2 upserted successfully"))
        .stdout(predicate::str::contains("Batch 2..3 upserted successfully"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_batch_still_exits_zero() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid input syntax"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path());
    let uri = server.uri();

    compsync(dir.path())
        .arg("--source")
        .arg(&source)
        .args(["--endpoint-url", uri.as_str(), "--api-key", "test-key"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Error on batch 0..3"))
        .stdout(predicate::str::contains("invalid input syntax"));
}

#[test]
fn test_missing_source_exits_one() {
    let dir = tempfile::tempdir().unwrap();

    compsync(dir.path())
        .env("SUPABASE_URL", "http://127.0.0.1:9")
        .env("SUPABASE_API_KEY", "test-key")
        .args(["--source", "does-not-exist.csv"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("file not found"));
}

#[test]
fn test_missing_credentials_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path());

    compsync(dir.path())
        .arg("--source")
        .arg(&source)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("SUPABASE_URL"));
}

#[test]
fn test_dry_run_exports_without_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path());
    let export = dir.path().join("normalized.jsonl");

    compsync(dir.path())
        .arg("--source")
        .arg(&source)
        .arg("--export")
        .arg(&export)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run complete"))
        .stdout(predicate::str::contains("2024-03-15"));

    let written = std::fs::read_to_string(&export).unwrap();
    assert_eq!(written.lines().count(), 3);
    assert!(written.contains(r#""dateshipped":"2024-03-14""#));
}

#[test]
fn test_env_file_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path());
    std::fs::write(
        dir.path().join(".env"),
        "COMPSYNC_SOURCE=Component_rows.csv\n",
    )
    .unwrap();

    compsync(dir.path())
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded source file"));
}
