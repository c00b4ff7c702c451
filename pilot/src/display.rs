//! Projection of named test outcomes onto a diagnostic surface.

use crate::host::{Diagnostic, DiagnosticSeverity, DiagnosticsSink};
use std::sync::Arc;
use toolchain::{Position, Range, TestEntity};

/// Renders per-entity outcomes (waiting/ok/FAIL/unknown) as diagnostics on
/// the entity's source file. Holds no state beyond what it has written.
pub struct TestResultDisplay {
    source: String,
    sink: Arc<dyn DiagnosticsSink>,
}

impl TestResultDisplay {
    pub fn new(source: impl Into<String>, sink: Arc<dyn DiagnosticsSink>) -> Self {
        Self {
            source: source.into(),
            sink,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn clear(&self) {
        self.sink.clear();
    }

    pub fn display_success(&self, entity: &TestEntity) {
        self.display(
            entity,
            format!("ok: {}", entity.name),
            DiagnosticSeverity::Information,
        );
    }

    pub fn display_failure(&self, entity: &TestEntity) {
        self.display(
            entity,
            format!("FAIL: {}", entity.name),
            DiagnosticSeverity::Error,
        );
    }

    /// Unknown indicates the runner's output never mentioned the entity;
    /// surfaced explicitly so it is not mistaken for a pass.
    pub fn display_unknown(&self, entity: &TestEntity) {
        self.display(
            entity,
            format!("unknown: {}", entity.name),
            DiagnosticSeverity::Error,
        );
    }

    pub fn display_waiting(&self, entity: &TestEntity) {
        self.display(
            entity,
            format!("waiting: {}", entity.name),
            DiagnosticSeverity::Information,
        );
    }

    fn display(&self, entity: &TestEntity, message: String, severity: DiagnosticSeverity) {
        // Only highlight the first line of the function.
        let start = entity.range.start;
        let range = Range::new(start, Position::new(start.line, 1000));
        self.sink.push(
            &entity.file,
            Diagnostic {
                range,
                message,
                severity,
                source: self.source.clone(),
            },
        );
    }
}
