//! Build/vet diagnostics projection.
//!
//! Runs the toolchain's build check or vet over a package and mirrors the
//! scraped `file:line:col` records onto the diagnostics surface, with a
//! small status readout alongside.

use crate::coordinator::PilotResult;
use crate::host::{Diagnostic, DiagnosticSeverity, DiagnosticsSink, StatusIndicator, StatusState};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use toolchain::{CheckDiagnostic, CheckSeverity, GoToolchain, Position, Range};

pub struct CheckManager {
    toolchain: Arc<GoToolchain>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    status: Arc<dyn StatusIndicator>,
    vet_token: Mutex<Option<CancellationToken>>,
}

impl CheckManager {
    pub fn new(
        toolchain: Arc<GoToolchain>,
        diagnostics: Arc<dyn DiagnosticsSink>,
        status: Arc<dyn StatusIndicator>,
    ) -> Self {
        Self {
            toolchain,
            diagnostics,
            status,
            vet_token: Mutex::new(None),
        }
    }

    /// Build-check the package in `dir` and publish compiler errors.
    /// Returns the number of diagnostics found.
    pub async fn run_build(&self, dir: &Path, is_test_package: bool) -> PilotResult<usize> {
        let found = self.toolchain.check(dir, is_test_package).await?;
        self.publish(dir, &found);
        Ok(found.len())
    }

    /// Vet the package in `dir` and publish warnings. Starting a new vet
    /// cancels one still in flight; only the newest publishes.
    pub async fn run_vet(&self, dir: &Path) -> PilotResult<usize> {
        let token = CancellationToken::new();
        if let Some(previous) = self.vet_token.lock().unwrap().replace(token.clone()) {
            debug!("cancelling in-flight vet");
            previous.cancel();
        }

        let found = self.toolchain.vet(dir, &token).await?;
        self.publish(dir, &found);
        Ok(found.len())
    }

    fn publish(&self, dir: &Path, found: &[CheckDiagnostic]) {
        self.diagnostics.clear();
        for check in found {
            let line = check.line.saturating_sub(1);
            let column = check.column.unwrap_or(1).saturating_sub(1);
            let file = if check.file.is_absolute() {
                check.file.clone()
            } else {
                dir.join(&check.file)
            };
            self.diagnostics.push(
                &file,
                Diagnostic {
                    range: Range::new(Position::new(line, column), Position::new(line, 1000)),
                    message: check.message.clone(),
                    severity: match check.severity {
                        CheckSeverity::Error => DiagnosticSeverity::Error,
                        CheckSeverity::Warning => DiagnosticSeverity::Warning,
                    },
                    source: "go".to_string(),
                },
            );
        }

        if found.is_empty() {
            self.status.hide();
        } else {
            self.status.show(StatusState {
                text: format!("go: {} problems", found.len()),
                command: None,
                color: Some("error".to_string()),
            });
        }
    }
}
