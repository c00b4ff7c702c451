pub mod check;
pub mod codelens;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod coverage;
pub mod debounce;
pub mod display;
pub mod host;
pub mod notify;

pub use check::CheckManager;
pub use codelens::{CodeLens, LensCommand, TestCodeLensProvider};
pub use config::{ConfigError, PilotConfig};
pub use coordinator::{PilotError, PilotResult, PinCoordinator, PinPhase};
pub use coverage::{CoverageError, CoverageTracker, FileCoverage};
pub use debounce::Debouncer;
pub use display::TestResultDisplay;
pub use host::{
    Diagnostic, DiagnosticSeverity, DiagnosticsSink, EditorContext, EditorHost, EditorView,
    HostSurfaces, MemoryDiagnostics, MemoryHost, MemoryOutput, MemoryOutputFactory, MemoryStatus,
    OutputFactory, OutputSink, StatusIndicator, StatusState, ViewRegistry,
};
pub use notify::{RenderNotifier, RenderSignal};
