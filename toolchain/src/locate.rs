use crate::runner::{ToolchainError, ToolchainResult};
use crate::types::{Position, Range, TestEntity, TestFlavor};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tokio_util::sync::CancellationToken;

static TEST_FUNC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^func\s+(Test\w*)\s*\(").expect("valid regex"));

static BENCH_FUNC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^func\s+(Benchmark\w*)\s*\(").expect("valid regex"));

/// Extracts named test-entity ranges from a source document.
///
/// Entities are snapshots of the document at query time; callers re-query
/// after every edit rather than patching stale ranges.
#[async_trait]
pub trait TestLocator: Send + Sync {
    async fn test_entities(
        &self,
        file: &Path,
        flavor: TestFlavor,
        token: &CancellationToken,
    ) -> ToolchainResult<Vec<TestEntity>>;

    fn is_test_file(&self, file: &Path) -> bool {
        file.to_string_lossy().ends_with("_test.go")
    }
}

/// Locator that scans source text for top-level test/benchmark functions.
pub struct SourceScanLocator;

#[async_trait]
impl TestLocator for SourceScanLocator {
    async fn test_entities(
        &self,
        file: &Path,
        flavor: TestFlavor,
        token: &CancellationToken,
    ) -> ToolchainResult<Vec<TestEntity>> {
        if token.is_cancelled() {
            return Err(ToolchainError::Cancelled);
        }
        let source = tokio::fs::read_to_string(file).await?;
        if token.is_cancelled() {
            return Err(ToolchainError::Cancelled);
        }
        Ok(scan_source(&source, file, flavor))
    }
}

fn scan_source(source: &str, file: &Path, flavor: TestFlavor) -> Vec<TestEntity> {
    let pattern: &Regex = match flavor {
        TestFlavor::Test => &TEST_FUNC,
        TestFlavor::Benchmark => &BENCH_FUNC,
    };

    let lines: Vec<&str> = source.lines().collect();
    let mut entities = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        let Some(caps) = pattern.captures(line) else {
            continue;
        };
        // Top-level functions close with a brace in column zero.
        let end = lines[index + 1..]
            .iter()
            .position(|l| l.starts_with('}'))
            .map(|offset| index + 1 + offset)
            .unwrap_or(lines.len().saturating_sub(1));

        entities.push(TestEntity::new(
            caps[1].to_string(),
            file,
            Range::new(
                Position::new(index as u32, 0),
                Position::new(end as u32, 1),
            ),
        ));
    }

    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "package pkg\n\
\n\
import \"testing\"\n\
\n\
func TestAlpha(t *testing.T) {\n\
\tif 1 != 1 {\n\
\t\tt.Fail()\n\
\t}\n\
}\n\
\n\
func helper() {}\n\
\n\
func TestBeta(t *testing.T) {\n\
\tt.Skip()\n\
}\n\
\n\
func BenchmarkGamma(b *testing.B) {\n\
\tfor i := 0; i < b.N; i++ {\n\
\t}\n\
}\n";

    #[test]
    fn test_scan_finds_tests_in_document_order() {
        let entities = scan_source(SAMPLE, Path::new("pkg/a_test.go"), TestFlavor::Test);
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["TestAlpha", "TestBeta"]);

        assert_eq!(entities[0].range.start, Position::new(4, 0));
        assert_eq!(entities[0].range.end, Position::new(8, 1));
        assert_eq!(entities[1].range.start, Position::new(12, 0));
    }

    #[test]
    fn test_scan_finds_benchmarks() {
        let entities = scan_source(SAMPLE, Path::new("pkg/a_test.go"), TestFlavor::Benchmark);
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["BenchmarkGamma"]);
    }

    #[test]
    fn test_is_test_file() {
        let locator = SourceScanLocator;
        assert!(locator.is_test_file(Path::new("pkg/a_test.go")));
        assert!(!locator.is_test_file(Path::new("pkg/a.go")));
        assert!(!locator.is_test_file(Path::new("pkg/test.go")));
    }

    #[tokio::test]
    async fn test_locator_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample_test.go");
        tokio::fs::write(&path, SAMPLE).await.unwrap();

        let locator = SourceScanLocator;
        let entities = locator
            .test_entities(&path, TestFlavor::Test, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].file, path);
    }

    #[tokio::test]
    async fn test_locator_honors_cancellation() {
        let token = CancellationToken::new();
        token.cancel();

        let locator = SourceScanLocator;
        let result = locator
            .test_entities(Path::new("does/not/matter_test.go"), TestFlavor::Test, &token)
            .await;
        assert!(matches!(result, Err(ToolchainError::Cancelled)));
    }
}
