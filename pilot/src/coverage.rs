//! Coverage-profile parsing and gutter decoration.
//!
//! The profile is a line-oriented text report from the external tool:
//!
//! ```text
//! mode: set
//! pkg/file.go:3.1,5.2 1 1
//! pkg/file.go:6.1,6.10 1 0
//! ```
//!
//! Data lines are `file:startLine.startCol,endLine.endCol hits isCovered`;
//! the header (and anything else that does not match) is skipped. Stored
//! state is replaced wholesale on each re-analysis, never patched.

use crate::host::ViewRegistry;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use toolchain::{Position, Range};

static PROFILE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([^:]+):(\d+)\.(\d+),(\d+)\.(\d+)\s(\d+)\s(\d+)").expect("valid regex")
});

#[derive(Error, Debug)]
pub enum CoverageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CoverageResult<T> = Result<T, CoverageError>;

/// Covered/uncovered spans for one file, keyed by the path exactly as it
/// appears in the profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileCoverage {
    pub covered: Vec<Range>,
    pub uncovered: Vec<Range>,
}

/// Owns the parsed coverage map and paints it onto matching visible views.
pub struct CoverageTracker {
    views: Arc<ViewRegistry>,
    profile_path: Mutex<Option<PathBuf>>,
    files: Mutex<HashMap<String, FileCoverage>>,
}

impl CoverageTracker {
    pub fn new(views: Arc<ViewRegistry>) -> Self {
        Self {
            views,
            profile_path: Mutex::new(None),
            files: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_profile_path(&self, path: impl Into<PathBuf>) {
        *self.profile_path.lock().unwrap() = Some(path.into());
    }

    pub fn clear_profile_path(&self) {
        *self.profile_path.lock().unwrap() = None;
    }

    pub fn profile_path(&self) -> Option<PathBuf> {
        self.profile_path.lock().unwrap().clone()
    }

    /// Remove all decoration and forget the parsed map.
    pub fn clear(&self) {
        self.apply(true);
        self.files.lock().unwrap().clear();
    }

    /// Re-read the profile and repaint every matching visible view.
    ///
    /// Idempotent; with no profile path set (or the profile not yet
    /// written) this resolves to a no-op rather than an error.
    pub async fn reanalyze(&self) -> CoverageResult<()> {
        self.clear();
        let Some(path) = self.profile_path() else {
            return Ok(());
        };

        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "coverage profile absent, skipping");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        let mut parsed: HashMap<String, FileCoverage> = HashMap::new();
        let mut lines = BufReader::new(file).lines();
        while let Some(line) = lines.next_line().await? {
            let Some((filename, range, covered)) = parse_profile_line(&line) else {
                continue;
            };
            let entry = parsed.entry(filename).or_default();
            if covered {
                entry.covered.push(range);
            } else {
                entry.uncovered.push(range);
            }
        }

        debug!(files = parsed.len(), "coverage profile parsed");
        *self.files.lock().unwrap() = parsed;
        self.apply(false);
        Ok(())
    }

    /// Files named by the current profile, as spelled in the profile.
    pub fn tracked_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self.files.lock().unwrap().keys().cloned().collect();
        files.sort();
        files
    }

    pub fn coverage_for(&self, key: &str) -> Option<FileCoverage> {
        self.files.lock().unwrap().get(key).cloned()
    }

    /// Repaint coverage onto a single view, e.g. when it becomes visible.
    pub fn apply_to_view(&self, view: &crate::host::EditorView) {
        let files = self.files.lock().unwrap();
        for (filename, coverage) in files.iter() {
            if path_matches(view.path(), filename) {
                highlight(view, coverage, false);
            }
        }
    }

    /// Drop coverage for a document whose content changed; stale ranges
    /// would otherwise decorate the wrong lines.
    pub fn remove_for_document(&self, document: &Path) {
        let mut files = self.files.lock().unwrap();
        let views = self.views.visible();
        files.retain(|filename, coverage| {
            if !path_matches(document, filename) {
                return true;
            }
            for view in views.iter().filter(|v| v.path() == document) {
                highlight(view, coverage, true);
            }
            false
        });
    }

    fn apply(&self, remove: bool) {
        let files = self.files.lock().unwrap();
        for (filename, coverage) in files.iter() {
            for view in self.views.visible() {
                if path_matches(view.path(), filename) {
                    highlight(&view, coverage, remove);
                }
            }
        }
    }
}

fn highlight(view: &crate::host::EditorView, coverage: &FileCoverage, remove: bool) {
    // Always reset both sets so a repaint never stacks stale ranges.
    view.set_decorations(Vec::new(), Vec::new());
    if remove {
        return;
    }
    view.set_decorations(coverage.covered.clone(), coverage.uncovered.clone());
}

/// Suffix match between an open document path and a stored profile key.
/// Keys starting with an underscore (an external-module marker) also match
/// the same path without it; the fallback happens at lookup time, both
/// forms stay matchable.
fn path_matches(path: &Path, key: &str) -> bool {
    let path = path.to_string_lossy();
    if path.ends_with(key) {
        return true;
    }
    match key.strip_prefix('_') {
        Some(stripped) => path.ends_with(stripped),
        None => false,
    }
}

fn parse_profile_line(line: &str) -> Option<(String, Range, bool)> {
    let caps = PROFILE_LINE.captures(line)?;
    let start_line: u32 = caps[2].parse().ok()?;
    let start_col: u32 = caps[3].parse().ok()?;
    let end_line: u32 = caps[4].parse().ok()?;
    let end_col: u32 = caps[5].parse().ok()?;
    let covered = caps[7].parse::<u32>().ok()? == 1;

    // Profile positions are one-based.
    let range = Range::new(
        Position::new(start_line.saturating_sub(1), start_col.saturating_sub(1)),
        Position::new(end_line.saturating_sub(1), end_col.saturating_sub(1)),
    );
    Some((caps[1].to_string(), range, covered))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_profile_line() {
        let (filename, range, covered) =
            parse_profile_line("pkg/file.go:3.1,5.2 1 1").expect("data line");
        assert_eq!(filename, "pkg/file.go");
        assert_eq!(range.start, Position::new(2, 0));
        assert_eq!(range.end, Position::new(4, 1));
        assert!(covered);

        let (_, _, covered) = parse_profile_line("pkg/file.go:6.1,6.10 1 0").expect("data line");
        assert!(!covered);
    }

    #[test]
    fn test_mode_header_is_skipped() {
        assert!(parse_profile_line("mode: set").is_none());
        assert!(parse_profile_line("").is_none());
    }

    #[test]
    fn test_underscore_fallback_matching() {
        assert!(path_matches(Path::new("/src/mod/file.go"), "_mod/file.go"));
        assert!(path_matches(Path::new("/src/mod/file.go"), "mod/file.go"));
        assert!(!path_matches(Path::new("/src/other/file.go"), "_mod/file.go"));
    }

    #[tokio::test]
    async fn test_reanalyze_paints_matching_views() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join("cover.out");
        tokio::fs::write(
            &profile,
            "mode: set\npkg/file.go:3.1,5.2 1 1\npkg/file.go:6.1,6.10 1 0\n",
        )
        .await
        .unwrap();

        let views = ViewRegistry::new();
        let view = views.open("/go/src/pkg/file.go");
        let other = views.open("/go/src/pkg/other.go");

        let tracker = CoverageTracker::new(views.clone());
        tracker.set_profile_path(&profile);
        tracker.reanalyze().await.unwrap();

        assert_eq!(view.covered(), vec![Range::new(
            Position::new(2, 0),
            Position::new(4, 1),
        )]);
        assert_eq!(view.uncovered(), vec![Range::new(
            Position::new(5, 0),
            Position::new(5, 9),
        )]);
        assert!(other.covered().is_empty());
    }

    #[tokio::test]
    async fn test_reanalyze_without_profile_is_noop() {
        let views = ViewRegistry::new();
        let view = views.open("/go/src/pkg/file.go");
        view.set_decorations(vec![Range::from_lines(0, 1)], vec![]);

        let tracker = CoverageTracker::new(views.clone());
        tracker.reanalyze().await.unwrap();

        // No profile path: previously applied decoration survives because
        // the tracker had nothing of its own to clear.
        assert!(tracker.profile_path().is_none());
    }

    #[tokio::test]
    async fn test_reanalyze_with_missing_file_is_noop() {
        let views = ViewRegistry::new();
        let tracker = CoverageTracker::new(views);
        tracker.set_profile_path("/definitely/not/here.out");
        tracker.reanalyze().await.unwrap();
    }

    #[tokio::test]
    async fn test_second_analysis_replaces_first() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join("cover.out");
        tokio::fs::write(&profile, "pkg/file.go:3.1,5.2 1 1\n").await.unwrap();

        let views = ViewRegistry::new();
        let view = views.open("/go/src/pkg/file.go");
        let tracker = CoverageTracker::new(views.clone());
        tracker.set_profile_path(&profile);
        tracker.reanalyze().await.unwrap();
        assert_eq!(view.covered().len(), 1);
        assert!(view.uncovered().is_empty());

        tokio::fs::write(&profile, "pkg/file.go:3.1,5.2 1 0\n").await.unwrap();
        tracker.reanalyze().await.unwrap();
        assert!(view.covered().is_empty());
        assert_eq!(view.uncovered().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_for_document() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join("cover.out");
        tokio::fs::write(&profile, "pkg/file.go:3.1,5.2 1 1\n").await.unwrap();

        let views = ViewRegistry::new();
        let view = views.open("/go/src/pkg/file.go");
        let tracker = CoverageTracker::new(views.clone());
        tracker.set_profile_path(&profile);
        tracker.reanalyze().await.unwrap();
        assert_eq!(view.covered().len(), 1);

        tracker.remove_for_document(Path::new("/go/src/pkg/file.go"));
        assert!(view.covered().is_empty());

        // Entry is gone; a later apply paints nothing.
        tracker.apply_to_view(&view);
        assert!(view.covered().is_empty());
    }
}
