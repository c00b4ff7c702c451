use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Zero-based line/column position in a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Zero-based half-open-ish span between two positions (inclusive of start,
/// bounded by end the way the editor host treats decoration spans).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn from_lines(start_line: u32, end_line: u32) -> Self {
        Self {
            start: Position::new(start_line, 0),
            end: Position::new(end_line, 0),
        }
    }

    /// Whether a position falls inside this range.
    pub fn contains(&self, pos: Position) -> bool {
        pos >= self.start && pos <= self.end
    }
}

/// Whether an entity is an ordinary test or a benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestFlavor {
    Test,
    Benchmark,
}

/// A named, located test or benchmark function discovered in a source file.
///
/// Entities are snapshots: they are produced fresh on every query and go
/// stale the moment the file changes. Names are unique within a file but
/// not globally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestEntity {
    pub name: String,
    pub file: PathBuf,
    pub range: Range,
}

impl TestEntity {
    pub fn new(name: impl Into<String>, file: impl Into<PathBuf>, range: Range) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            range,
        }
    }
}

/// Parameters of one test invocation.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Working directory the toolchain is invoked in.
    pub dir: PathBuf,
    /// Extra command-line flags passed through to the tool.
    pub flags: Vec<String>,
    /// The entities targeted by this run.
    pub entities: Vec<TestEntity>,
    pub flavor: TestFlavor,
    /// Where to write a coverage profile, if coverage was requested.
    pub coverage_profile: Option<PathBuf>,
    /// Source file this run was initiated from, used to detect whether the
    /// run still belongs to the active document.
    pub source_file: Option<PathBuf>,
}

impl RunRequest {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            flags: Vec::new(),
            entities: Vec::new(),
            flavor: TestFlavor::Test,
            coverage_profile: None,
            source_file: None,
        }
    }

    pub fn with_flags(mut self, flags: Vec<String>) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_entities(mut self, entities: Vec<TestEntity>) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_flavor(mut self, flavor: TestFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    pub fn with_coverage_profile(mut self, path: impl Into<PathBuf>) -> Self {
        self.coverage_profile = Some(path.into());
        self
    }

    pub fn with_source_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_file = Some(path.into());
        self
    }

    /// Names of the targeted entities, in document order.
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.name.as_str()).collect()
    }
}

/// Outcome of one invocation. Immutable once produced.
///
/// An entity name absent from `tests` means the runner's output never
/// mentioned it; callers surface that as "unknown" rather than silently
/// treating it as a pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOutcome {
    pub tests: HashMap<String, bool>,
    pub build_failed: bool,
    pub success: bool,
}

impl RunOutcome {
    pub fn passed(&self, name: &str) -> Option<bool> {
        self.tests.get(name).copied()
    }
}

/// Severity of a build/vet diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckSeverity {
    Error,
    Warning,
}

/// One `file:line:col: message` record scraped from build or vet output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckDiagnostic {
    pub file: PathBuf,
    /// One-based line as printed by the tool.
    pub line: u32,
    /// One-based column; tools omit it for some records.
    pub column: Option<u32>,
    pub message: String,
    pub severity: CheckSeverity,
}

/// A declaration reported by the external workspace-symbol tool.
///
/// Keep in sync with the JSON emitted by go-symbols.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolDeclaration {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub package: String,
    pub path: PathBuf,
    pub line: u32,
    pub character: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_contains() {
        let range = Range::from_lines(3, 10);
        assert!(range.contains(Position::new(3, 0)));
        assert!(range.contains(Position::new(7, 42)));
        assert!(range.contains(Position::new(10, 0)));
        assert!(!range.contains(Position::new(2, 99)));
        assert!(!range.contains(Position::new(11, 0)));
    }

    #[test]
    fn test_run_request_builder() {
        let entity = TestEntity::new("TestFoo", "pkg/foo_test.go", Range::from_lines(4, 9));
        let request = RunRequest::new("/src/pkg")
            .with_flags(vec!["-count=1".to_string()])
            .with_entities(vec![entity])
            .with_flavor(TestFlavor::Benchmark)
            .with_coverage_profile("/tmp/cover.out")
            .with_source_file("pkg/foo_test.go");

        assert_eq!(request.dir, PathBuf::from("/src/pkg"));
        assert_eq!(request.entity_names(), vec!["TestFoo"]);
        assert_eq!(request.flavor, TestFlavor::Benchmark);
        assert!(request.coverage_profile.is_some());
        assert!(request.source_file.is_some());
    }

    #[test]
    fn test_outcome_lookup() {
        let mut outcome = RunOutcome::default();
        outcome.tests.insert("TestFoo".to_string(), true);
        outcome.tests.insert("TestBar".to_string(), false);

        assert_eq!(outcome.passed("TestFoo"), Some(true));
        assert_eq!(outcome.passed("TestBar"), Some(false));
        assert_eq!(outcome.passed("TestBaz"), None);
    }

    #[test]
    fn test_symbol_declaration_wire_format() {
        let json = r#"{"name":"TestAlpha","kind":"func","package":"pkg","path":"/src/pkg/a_test.go","line":12,"character":5}"#;
        let decl: SymbolDeclaration = serde_json::from_str(json).unwrap();
        assert_eq!(decl.name, "TestAlpha");
        assert_eq!(decl.line, 12);
    }
}
