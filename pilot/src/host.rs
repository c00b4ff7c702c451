//! Editor host surfaces consumed by the integration layer.
//!
//! The real editor owns diagnostics, the status bar, output channels, and
//! visible views; this module defines the narrow traits we require from it,
//! plus in-memory implementations used by the CLI and the test suite.

use async_trait::async_trait;
use chrono::Local;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use toolchain::{Position, Range};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Information,
    Hint,
}

/// One record on a per-source diagnostic surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub range: Range,
    pub message: String,
    pub severity: DiagnosticSeverity,
    /// Tag identifying which subsystem wrote the record.
    pub source: String,
}

/// A diagnostics collection keyed by source file.
pub trait DiagnosticsSink: Send + Sync {
    fn push(&self, file: &Path, diagnostic: Diagnostic);
    fn get(&self, file: &Path) -> Vec<Diagnostic>;
    fn clear(&self);
}

#[derive(Default)]
pub struct MemoryDiagnostics {
    entries: Mutex<HashMap<PathBuf, Vec<Diagnostic>>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every file that currently has at least one diagnostic.
    pub fn files(&self) -> Vec<PathBuf> {
        let entries = self.entries.lock().unwrap();
        entries
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, _)| k.clone())
            .collect()
    }
}

impl DiagnosticsSink for MemoryDiagnostics {
    fn push(&self, file: &Path, diagnostic: Diagnostic) {
        let mut entries = self.entries.lock().unwrap();
        entries.entry(file.to_path_buf()).or_default().push(diagnostic);
    }

    fn get(&self, file: &Path) -> Vec<Diagnostic> {
        let entries = self.entries.lock().unwrap();
        entries.get(file).cloned().unwrap_or_default()
    }

    fn clear(&self) {
        let mut entries = self.entries.lock().unwrap();
        entries.clear();
    }
}

/// Contents of the status-bar indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusState {
    pub text: String,
    pub command: Option<String>,
    pub color: Option<String>,
}

pub trait StatusIndicator: Send + Sync {
    fn show(&self, state: StatusState);
    fn hide(&self);
    fn current(&self) -> Option<StatusState>;
}

#[derive(Default)]
pub struct MemoryStatus {
    state: Mutex<Option<StatusState>>,
}

impl MemoryStatus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl StatusIndicator for MemoryStatus {
    fn show(&self, state: StatusState) {
        *self.state.lock().unwrap() = Some(state);
    }

    fn hide(&self) {
        *self.state.lock().unwrap() = None;
    }

    fn current(&self) -> Option<StatusState> {
        self.state.lock().unwrap().clone()
    }
}

/// A named, disposable log surface. One is created per pin and per
/// whole-file run and released when that run is cleared or superseded.
pub trait OutputSink: Send + Sync {
    fn name(&self) -> &str;
    fn append_line(&self, line: &str);
    fn show(&self);
    fn dispose(&self);
}

pub trait OutputFactory: Send + Sync {
    fn create(&self, name: &str) -> Arc<dyn OutputSink>;
}

pub struct MemoryOutput {
    name: String,
    lines: Mutex<Vec<String>>,
    visible: AtomicBool,
    disposed: AtomicBool,
}

impl MemoryOutput {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            lines: Mutex::new(Vec::new()),
            visible: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl OutputSink for MemoryOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn append_line(&self, line: &str) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let stamped = format!("[{}] {}", Local::now().format("%H:%M:%S"), line);
        self.lines.lock().unwrap().push(stamped);
    }

    fn show(&self) {
        self.visible.store(true, Ordering::SeqCst);
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.visible.store(false, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct MemoryOutputFactory {
    created: Mutex<Vec<Arc<MemoryOutput>>>,
}

impl MemoryOutputFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created(&self) -> Vec<Arc<MemoryOutput>> {
        self.created.lock().unwrap().clone()
    }
}

impl OutputFactory for MemoryOutputFactory {
    fn create(&self, name: &str) -> Arc<dyn OutputSink> {
        let output = MemoryOutput::new(name);
        self.created
            .lock()
            .unwrap()
            .push(output.clone());
        output
    }
}

/// Snapshot of the active editor when a command fires.
#[derive(Debug, Clone)]
pub struct EditorContext {
    pub file: PathBuf,
    pub cursor: Position,
}

impl EditorContext {
    pub fn new(file: impl Into<PathBuf>, cursor: Position) -> Self {
        Self {
            file: file.into(),
            cursor,
        }
    }
}

/// Host operations outside any single surface: persisting documents,
/// informational pop-ups, revealing the problems pane.
#[async_trait]
pub trait EditorHost: Send + Sync {
    async fn save_document(&self, file: &Path) -> std::io::Result<()>;
    fn show_info(&self, message: &str);
    fn reveal_diagnostics(&self);
}

#[derive(Default)]
pub struct MemoryHost {
    saved: Mutex<Vec<PathBuf>>,
    messages: Mutex<Vec<String>>,
}

impl MemoryHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn saved(&self) -> Vec<PathBuf> {
        self.saved.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl EditorHost for MemoryHost {
    async fn save_document(&self, file: &Path) -> std::io::Result<()> {
        self.saved
            .lock()
            .unwrap()
            .push(file.to_path_buf());
        Ok(())
    }

    fn show_info(&self, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push(message.to_string());
    }

    fn reveal_diagnostics(&self) {}
}

/// A visible view of a document, carrying coverage gutter decorations.
pub struct EditorView {
    path: PathBuf,
    covered: Mutex<Vec<Range>>,
    uncovered: Mutex<Vec<Range>>,
}

impl EditorView {
    fn new(path: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            path,
            covered: Mutex::new(Vec::new()),
            uncovered: Mutex::new(Vec::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_decorations(&self, covered: Vec<Range>, uncovered: Vec<Range>) {
        *self.covered.lock().unwrap() = covered;
        *self.uncovered.lock().unwrap() = uncovered;
    }

    pub fn covered(&self) -> Vec<Range> {
        self.covered.lock().unwrap().clone()
    }

    pub fn uncovered(&self) -> Vec<Range> {
        self.uncovered.lock().unwrap().clone()
    }
}

/// The set of views currently visible in the editor.
#[derive(Default)]
pub struct ViewRegistry {
    views: Mutex<Vec<Arc<EditorView>>>,
}

impl ViewRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self, path: impl Into<PathBuf>) -> Arc<EditorView> {
        let view = EditorView::new(path.into());
        self.views
            .lock()
            .unwrap()
            .push(view.clone());
        view
    }

    pub fn close(&self, path: &Path) {
        let mut views = self.views.lock().unwrap();
        views.retain(|v| v.path() != path);
    }

    pub fn visible(&self) -> Vec<Arc<EditorView>> {
        self.views.lock().unwrap().clone()
    }

    pub fn find(&self, path: &Path) -> Option<Arc<EditorView>> {
        self.views
            .lock()
            .unwrap()
            .iter()
            .find(|v| v.path() == path)
            .cloned()
    }
}

/// Bundle of host surfaces handed to the coordinator at activation.
#[derive(Clone)]
pub struct HostSurfaces {
    pub editor: Arc<dyn EditorHost>,
    pub outputs: Arc<dyn OutputFactory>,
    pub status: Arc<dyn StatusIndicator>,
    pub pin_diagnostics: Arc<dyn DiagnosticsSink>,
    pub file_diagnostics: Arc<dyn DiagnosticsSink>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagnostic(message: &str) -> Diagnostic {
        Diagnostic {
            range: Range::from_lines(0, 0),
            message: message.to_string(),
            severity: DiagnosticSeverity::Information,
            source: "test".to_string(),
        }
    }

    #[test]
    fn test_memory_diagnostics_roundtrip() {
        let sink = MemoryDiagnostics::new();
        let file = Path::new("pkg/a_test.go");

        sink.push(file, diagnostic("one"));
        sink.push(file, diagnostic("two"));
        assert_eq!(sink.get(file).len(), 2);

        sink.clear();
        assert!(sink.get(file).is_empty());
        assert!(sink.files().is_empty());
    }

    #[test]
    fn test_memory_status() {
        let status = MemoryStatus::new();
        assert!(status.current().is_none());

        status.show(StatusState {
            text: "Autotest: TestFoo".to_string(),
            command: Some("autopin.show".to_string()),
            color: None,
        });
        assert_eq!(status.current().unwrap().text, "Autotest: TestFoo");

        status.hide();
        assert!(status.current().is_none());
    }

    #[test]
    fn test_output_dispose_stops_appends() {
        let output = MemoryOutput::new("Go Test TestFoo");
        output.append_line("running");
        assert_eq!(output.lines().len(), 1);
        assert!(output.lines()[0].ends_with("running"));

        output.dispose();
        output.append_line("late");
        assert_eq!(output.lines().len(), 1);
        assert!(output.is_disposed());
    }

    #[test]
    fn test_view_registry_open_close() {
        let registry = ViewRegistry::new();
        let view = registry.open("pkg/file.go");
        view.set_decorations(vec![Range::from_lines(1, 2)], vec![]);

        assert_eq!(registry.visible().len(), 1);
        assert_eq!(registry.find(Path::new("pkg/file.go")).unwrap().covered().len(), 1);

        registry.close(Path::new("pkg/file.go"));
        assert!(registry.visible().is_empty());
    }
}
