//! Integration tests against a real installed Go toolchain.
//!
//! All tests here are `#[ignore]`d; run them with `cargo test -- --ignored`
//! on a machine with `go` on the PATH.

use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use toolchain::{
    GoConfig, GoToolchain, RunRequest, SourceScanLocator, TestFlavor, TestLocator, TestRunner,
};

const TIMEOUT: Duration = Duration::from_secs(120);

const GO_MOD: &str = "module autopin/fixture\n\ngo 1.21\n";

const PASSING_AND_FAILING: &str = r#"package fixture

import "testing"

func TestPasses(t *testing.T) {
	if 2+2 != 4 {
		t.Fatal("arithmetic is broken")
	}
}

func TestFails(t *testing.T) {
	t.Fatal("always fails")
}
"#;

const BROKEN: &str = r#"package fixture

import "testing"

func TestNeverCompiles(t *testing.T) {
	undefinedIdentifier()
}
"#;

fn make_toolchain() -> GoToolchain {
    GoToolchain::new(GoConfig::default().with_timeout(TIMEOUT)).expect("toolchain creation")
}

async fn write_fixture(dir: &Path, source: &str) -> std::path::PathBuf {
    tokio::fs::write(dir.join("go.mod"), GO_MOD).await.unwrap();
    let test_file = dir.join("fixture_test.go");
    tokio::fs::write(&test_file, source).await.unwrap();
    test_file
}

#[tokio::test]
#[ignore]
async fn test_run_reports_per_entity_outcomes() {
    let dir = tempfile::tempdir().unwrap();
    let test_file = write_fixture(dir.path(), PASSING_AND_FAILING).await;

    let locator = SourceScanLocator;
    let entities = locator
        .test_entities(&test_file, TestFlavor::Test, &CancellationToken::new())
        .await
        .expect("locator");
    assert_eq!(entities.len(), 2);

    let toolchain = make_toolchain();
    let request = RunRequest::new(dir.path()).with_entities(entities);
    let outcome = toolchain.run(&request).await.expect("go test");

    assert_eq!(outcome.passed("TestPasses"), Some(true));
    assert_eq!(outcome.passed("TestFails"), Some(false));
    assert!(!outcome.build_failed);
    assert!(!outcome.success);
}

#[tokio::test]
#[ignore]
async fn test_run_flags_build_failure() {
    let dir = tempfile::tempdir().unwrap();
    let test_file = write_fixture(dir.path(), BROKEN).await;

    let locator = SourceScanLocator;
    let entities = locator
        .test_entities(&test_file, TestFlavor::Test, &CancellationToken::new())
        .await
        .expect("locator");

    let toolchain = make_toolchain();
    let request = RunRequest::new(dir.path()).with_entities(entities);
    let outcome = toolchain.run(&request).await.expect("go test");

    assert!(outcome.build_failed);
    assert_eq!(outcome.passed("TestNeverCompiles"), None);
}

#[tokio::test]
#[ignore]
async fn test_coverage_profile_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let test_file = write_fixture(dir.path(), PASSING_AND_FAILING).await;
    let profile = dir.path().join("cover.out");

    let locator = SourceScanLocator;
    let entities = locator
        .test_entities(&test_file, TestFlavor::Test, &CancellationToken::new())
        .await
        .expect("locator");

    let toolchain = make_toolchain();
    let request = RunRequest::new(dir.path())
        .with_entities(entities)
        .with_coverage_profile(&profile);
    toolchain.run(&request).await.expect("go test");

    let text = tokio::fs::read_to_string(&profile).await.expect("profile");
    assert!(text.starts_with("mode:"));
}

#[tokio::test]
#[ignore]
async fn test_check_reports_compile_errors() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), BROKEN).await;

    let toolchain = make_toolchain();
    let diagnostics = toolchain.check(dir.path(), true).await.expect("go build");

    assert!(!diagnostics.is_empty());
    assert!(diagnostics[0].message.contains("undefined"));
}
