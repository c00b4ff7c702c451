//! The pin/auto-run coordinator: single authority for "which test is
//! pinned", its execution lifecycle, and result republication.
//!
//! Pinned-test lifecycle:
//! Idle → Waiting → {Passed, Failed, Unknown, BuildFailed} → Waiting … ,
//! back to Idle only on an explicit clear or a failed re-resolution. There
//! is no terminal state while a pin exists; the machine cycles between
//! Waiting and an outcome until cleared.

use crate::config::PilotConfig;
use crate::coverage::CoverageTracker;
use crate::display::TestResultDisplay;
use crate::host::{EditorContext, HostSurfaces, OutputSink, StatusState};
use crate::notify::RenderNotifier;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use toolchain::{
    RunOutcome, RunRequest, TestEntity, TestFlavor, TestLocator, TestRunner, ToolchainError,
};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum PilotError {
    #[error("No editor is active.")]
    NoActiveEditor,

    #[error("No tests found. Current file is not a test file.")]
    NotATestFile,

    #[error("No test function found at cursor.")]
    NoTestAtCursor,

    #[error("Toolchain error: {0}")]
    Toolchain(#[from] ToolchainError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PilotResult<T> = Result<T, PilotError>;

/// Identity stamp of one pin/file-run session. Completions compare their
/// stamp against the current slot and discard themselves when superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunId(Uuid);

impl RunId {
    fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Aggregate pinned-test state, derived from the last outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PinPhase {
    #[default]
    Idle,
    Waiting,
    Passed,
    Failed,
    Unknown,
    BuildFailed,
}

struct TrackedRun {
    id: RunId,
    request: RunRequest,
    output: Arc<dyn OutputSink>,
}

#[derive(Default)]
struct CoordinatorState {
    pinned: Option<TrackedRun>,
    pin_outcome: Option<RunOutcome>,
    file_run: Option<TrackedRun>,
    file_outcome: Option<RunOutcome>,
    phase: PinPhase,
}

impl CoordinatorState {
    fn transition_to(&mut self, phase: PinPhase) {
        if self.phase != phase {
            debug!("pin phase transition: {:?} → {:?}", self.phase, phase);
            self.phase = phase;
        }
    }
}

/// Owns the single pinned-run slot and the single whole-file-run slot.
/// Both are written only here; views read published results and re-render
/// on notification.
pub struct PinCoordinator {
    runner: Arc<dyn TestRunner>,
    locator: Arc<dyn TestLocator>,
    surfaces: HostSurfaces,
    pin_display: TestResultDisplay,
    file_display: TestResultDisplay,
    coverage: Arc<CoverageTracker>,
    notifier: RenderNotifier,
    config: PilotConfig,
    state: Mutex<CoordinatorState>,
}

impl PinCoordinator {
    pub fn new(
        runner: Arc<dyn TestRunner>,
        locator: Arc<dyn TestLocator>,
        coverage: Arc<CoverageTracker>,
        surfaces: HostSurfaces,
        config: PilotConfig,
    ) -> Arc<Self> {
        let pin_display = TestResultDisplay::new("pinned", surfaces.pin_diagnostics.clone());
        let file_display = TestResultDisplay::new("autotest", surfaces.file_diagnostics.clone());
        Arc::new(Self {
            runner,
            locator,
            surfaces,
            pin_display,
            file_display,
            coverage,
            notifier: RenderNotifier::new(),
            config,
            state: Mutex::new(CoordinatorState::default()),
        })
    }

    pub fn notifier(&self) -> &RenderNotifier {
        &self.notifier
    }

    pub fn phase(&self) -> PinPhase {
        self.state.lock().unwrap().phase
    }

    pub fn is_pinned(&self, name: &str) -> bool {
        let state = self.state.lock().unwrap();
        state
            .pinned
            .as_ref()
            .map(|run| run.request.entities.iter().any(|e| e.name == name))
            .unwrap_or(false)
    }

    pub fn pinned_entities(&self) -> Vec<TestEntity> {
        let state = self.state.lock().unwrap();
        state
            .pinned
            .as_ref()
            .map(|run| run.request.entities.clone())
            .unwrap_or_default()
    }

    pub fn pinned_source_file(&self) -> Option<PathBuf> {
        let state = self.state.lock().unwrap();
        state
            .pinned
            .as_ref()
            .and_then(|run| run.request.source_file.clone())
    }

    pub fn pin_result_for(&self, name: &str) -> Option<bool> {
        let state = self.state.lock().unwrap();
        state.pin_outcome.as_ref().and_then(|o| o.passed(name))
    }

    pub fn file_result_for(&self, name: &str) -> Option<bool> {
        let state = self.state.lock().unwrap();
        state.file_outcome.as_ref().and_then(|o| o.passed(name))
    }

    /// Pin the test under the cursor (or the explicitly named entity) for
    /// continuous re-execution. The returned result reports the *setup*;
    /// the test itself is fired asynchronously.
    pub async fn pin_at_cursor(
        self: &Arc<Self>,
        editor: &EditorContext,
        flavor: TestFlavor,
        hint: Option<TestEntity>,
    ) -> PilotResult<TestEntity> {
        if !self.locator.is_test_file(&editor.file) {
            return Err(PilotError::NotATestFile);
        }

        // The external tool must see current content.
        self.surfaces.editor.save_document(&editor.file).await?;

        let entities = self
            .locator
            .test_entities(&editor.file, flavor, &CancellationToken::new())
            .await?;

        // Explicit entity argument wins; otherwise the first entity whose
        // range contains the selection start.
        let target = match hint {
            Some(hint) => Some(hint),
            None => entities
                .iter()
                .find(|e| e.range.contains(editor.cursor))
                .cloned(),
        };
        let Some(target) = target else {
            return Err(PilotError::NoTestAtCursor);
        };

        // Supersede whatever was tracked before, pin and file run alike.
        self.clear_pinned();
        self.dispose_file_run();

        let mut request = RunRequest::new(run_dir(&editor.file))
            .with_entities(vec![target.clone()])
            .with_flavor(flavor)
            .with_source_file(&editor.file);
        if self.config.coverage_on_pin {
            let profile =
                std::env::temp_dir().join(format!("autopin-{}.out", Uuid::new_v4()));
            request = request.with_coverage_profile(profile);
        }

        let output = self
            .surfaces
            .outputs
            .create(&format!("Go Test {}", target.name));
        output.append_line(&format!("pinned {}", target.name));

        {
            let mut state = self.state.lock().unwrap();
            state.pinned = Some(TrackedRun {
                id: RunId::fresh(),
                request,
                output,
            });
            state.pin_outcome = None;
            state.transition_to(PinPhase::Waiting);
        }
        info!(test = %target.name, "pinned test");

        self.pin_display.clear();
        self.pin_display.display_waiting(&target);
        self.update_status();
        self.surfaces.editor.reveal_diagnostics();
        self.notifier.fire();

        // Fire and forget the first run.
        let coordinator = self.clone();
        tokio::spawn(async move {
            coordinator.run_pinned().await;
        });

        Ok(target)
    }

    /// Run the pinned test once. No-op when nothing is pinned. Invocation
    /// failures are logged and leave the pin in place so the next trigger
    /// can retry.
    pub async fn run_pinned(&self) {
        let Some((id, request)) = ({
            let mut state = self.state.lock().unwrap();
            match state.pinned.as_ref().map(|run| (run.id, run.request.clone())) {
                Some(pair) => {
                    state.transition_to(PinPhase::Waiting);
                    Some(pair)
                }
                None => None,
            }
        }) else {
            return;
        };
        self.update_status();

        let outcome = match self.runner.run(&request).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!("pinned test invocation failed: {err}");
                return;
            }
        };

        {
            let mut state = self.state.lock().unwrap();
            let still_current = state.pinned.as_ref().map(|run| run.id) == Some(id);
            if !still_current {
                debug!("discarding result of superseded pinned run");
                return;
            }

            if let Some(run) = &state.pinned {
                run.output
                    .append_line(&format!("run finished, success: {}", outcome.success));
            }

            // Pinned results are always surfaced, build failure included:
            // the user explicitly asked to track these entities.
            self.pin_display.clear();
            for entity in &request.entities {
                match outcome.passed(&entity.name) {
                    None => self.pin_display.display_unknown(entity),
                    Some(true) => self.pin_display.display_success(entity),
                    Some(false) => self.pin_display.display_failure(entity),
                }
            }

            let phase = phase_for(&outcome, &request.entities);
            state.pin_outcome = Some(outcome);
            state.transition_to(phase);
        }

        self.update_status();
        if let Some(profile) = &request.coverage_profile {
            self.coverage.set_profile_path(profile);
        }
        if let Err(err) = self.coverage.reanalyze().await {
            warn!("coverage reanalysis failed: {err}");
        }
        self.notifier.fire();
    }

    /// Drop the pin and every surface derived from it. Safe to call
    /// redundantly.
    pub fn clear_pinned(&self) {
        let removed = {
            let mut state = self.state.lock().unwrap();
            let removed = state.pinned.take();
            state.pin_outcome = None;
            if removed.is_some() {
                state.transition_to(PinPhase::Idle);
            }
            removed
        };
        let Some(run) = removed else {
            return;
        };

        info!("cleared pinned test");
        run.output.dispose();
        self.pin_display.clear();
        self.update_status();
        self.coverage.clear_profile_path();
        self.coverage.clear();
        self.notifier.fire();
    }

    /// Debounced file-system-change trigger. Re-runs the pin when one
    /// exists; otherwise only clears the whole-file display so stale
    /// failures don't linger over edited code.
    pub async fn autorun_on_change(&self) {
        let pinned = self.state.lock().unwrap().pinned.is_some();
        if pinned {
            self.run_pinned().await;
        } else {
            self.clear_file_display();
        }
    }

    /// Active-editor-changed / activation trigger: silently run every test
    /// in the newly active file. The pin, when present, takes priority and
    /// suppresses the whole-file run entirely.
    pub async fn autotest_active_file(&self, editor: Option<&EditorContext>) {
        {
            let pinned = self.state.lock().unwrap().pinned.is_some();
            if pinned {
                self.clear_file_display();
                return;
            }
        }
        let Some(editor) = editor else {
            self.clear_file_display();
            return;
        };
        if !self.locator.is_test_file(&editor.file) {
            self.clear_file_display();
            return;
        }

        self.dispose_file_run();

        let entities = match self
            .locator
            .test_entities(&editor.file, TestFlavor::Test, &CancellationToken::new())
            .await
        {
            Ok(entities) => entities,
            Err(err) => {
                error!("file autotest entity query failed: {err}");
                self.notifier.fire();
                return;
            }
        };
        if entities.is_empty() {
            self.clear_file_display();
            return;
        }

        let request = RunRequest::new(run_dir(&editor.file))
            .with_entities(entities)
            .with_source_file(&editor.file);
        let output = self
            .surfaces
            .outputs
            .create(&format!("Go Test {}", editor.file.display()));
        let id = RunId::fresh();
        {
            let mut state = self.state.lock().unwrap();
            // Re-check the gate; a pin may have landed while we queried.
            if state.pinned.is_some() {
                drop(state);
                output.dispose();
                self.notifier.fire();
                return;
            }
            state.file_run = Some(TrackedRun {
                id,
                request: request.clone(),
                output,
            });
        }
        debug!(file = %editor.file.display(), "silent whole-file run");

        let outcome = match self.runner.run(&request).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!("file autotest invocation failed: {err}");
                self.notifier.fire();
                return;
            }
        };

        {
            let mut state = self.state.lock().unwrap();
            let still_current = state.file_run.as_ref().map(|run| run.id) == Some(id);
            if still_current {
                state.file_outcome = Some(outcome.clone());
            }
            // The display path checks the *current* pin state, not the
            // state when this run started: a pin created mid-flight keeps
            // its surfaces, and this result stays invisible.
            if still_current && state.pinned.is_none() {
                self.file_display.clear();
                if !outcome.build_failed {
                    for entity in &request.entities {
                        if outcome.passed(&entity.name) == Some(false) {
                            self.file_display.display_failure(entity);
                        }
                    }
                }
            }
        }

        self.notifier.fire();
    }

    /// Re-resolve the pinned entity against fresh symbols after its file
    /// was edited, so diagnostics stay attached to the right lines. A
    /// vanished name (deleted or renamed entity) clears the pin.
    pub async fn update_pinned_location(&self, file: &Path) {
        let Some((id, flavor, names)) = ({
            let state = self.state.lock().unwrap();
            state.pinned.as_ref().and_then(|run| {
                let matches = run
                    .request
                    .source_file
                    .as_deref()
                    .map(|source| source == file)
                    .unwrap_or(false);
                matches.then(|| {
                    (
                        run.id,
                        run.request.flavor,
                        run.request.entity_names().iter().map(|n| n.to_string()).collect::<Vec<_>>(),
                    )
                })
            })
        }) else {
            return;
        };

        let fresh = match self
            .locator
            .test_entities(file, flavor, &CancellationToken::new())
            .await
        {
            Ok(fresh) => fresh,
            Err(err) => {
                warn!("pinned location update failed: {err}");
                return;
            }
        };

        let relocated: Vec<TestEntity> = names
            .iter()
            .filter_map(|name| fresh.iter().find(|e| &e.name == name).cloned())
            .collect();
        if relocated.len() != names.len() {
            info!("pinned test no longer present in file, clearing pin");
            self.clear_pinned();
            self.notifier.fire();
            return;
        }

        let redraw = {
            let mut state = self.state.lock().unwrap();
            let still_current = state.pinned.as_ref().map(|run| run.id) == Some(id);
            if still_current {
                if let Some(run) = &mut state.pinned {
                    run.request.entities = relocated.clone();
                }
                Some(state.pin_outcome.clone())
            } else {
                None
            }
        };

        if let Some(outcome) = redraw {
            self.redraw_pin_display(&relocated, outcome.as_ref());
            self.notifier.fire();
        }
    }

    pub fn show_pinned_output(&self) {
        let state = self.state.lock().unwrap();
        if let Some(run) = &state.pinned {
            run.output.show();
        }
    }

    pub fn show_file_output(&self) {
        let state = self.state.lock().unwrap();
        if let Some(run) = &state.file_run {
            run.output.show();
        }
    }

    fn redraw_pin_display(&self, entities: &[TestEntity], outcome: Option<&RunOutcome>) {
        self.pin_display.clear();
        for entity in entities {
            match outcome {
                None => self.pin_display.display_waiting(entity),
                Some(outcome) => match outcome.passed(&entity.name) {
                    None => self.pin_display.display_unknown(entity),
                    Some(true) => self.pin_display.display_success(entity),
                    Some(false) => self.pin_display.display_failure(entity),
                },
            }
        }
    }

    fn clear_file_display(&self) {
        self.file_display.clear();
        self.notifier.fire();
    }

    fn dispose_file_run(&self) {
        let removed = {
            let mut state = self.state.lock().unwrap();
            state.file_outcome = None;
            state.file_run.take()
        };
        if let Some(run) = removed {
            run.output.dispose();
        }
        self.file_display.clear();
    }

    fn update_status(&self) {
        let status = {
            let state = self.state.lock().unwrap();
            state.pinned.as_ref().map(|run| {
                let name = run
                    .request
                    .entities
                    .first()
                    .map(|e| e.name.clone())
                    .unwrap_or_default();
                match state.phase {
                    PinPhase::Passed => StatusState {
                        text: format!("Autotest: {name} ok"),
                        command: Some("autopin.show".to_string()),
                        color: None,
                    },
                    PinPhase::Failed | PinPhase::BuildFailed => StatusState {
                        text: format!("Autotest: {name} FAIL"),
                        command: Some("autopin.show".to_string()),
                        color: Some("error".to_string()),
                    },
                    PinPhase::Unknown => StatusState {
                        text: format!("Autotest: {name} unknown"),
                        command: Some("autopin.show".to_string()),
                        color: Some("error".to_string()),
                    },
                    _ => StatusState {
                        text: format!("Autotest: {name}"),
                        command: Some("autopin.show".to_string()),
                        color: None,
                    },
                }
            })
        };

        match status {
            Some(status) => self.surfaces.status.show(status),
            None => self.surfaces.status.hide(),
        }
    }
}

fn phase_for(outcome: &RunOutcome, entities: &[TestEntity]) -> PinPhase {
    if outcome.build_failed {
        return PinPhase::BuildFailed;
    }
    let mut unknown = false;
    for entity in entities {
        match outcome.passed(&entity.name) {
            Some(false) => return PinPhase::Failed,
            None => unknown = true,
            Some(true) => {}
        }
    }
    if unknown {
        PinPhase::Unknown
    } else {
        PinPhase::Passed
    }
}

/// Tests run from the directory that owns the source file.
fn run_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(name: &str) -> TestEntity {
        TestEntity::new(name, "pkg/a_test.go", toolchain::Range::from_lines(0, 3))
    }

    #[test]
    fn test_phase_classification() {
        let entities = vec![entity("TestFoo"), entity("TestBar"), entity("TestBaz")];

        let mut outcome = RunOutcome::default();
        outcome.tests.insert("TestFoo".to_string(), true);
        outcome.tests.insert("TestBar".to_string(), false);
        assert_eq!(phase_for(&outcome, &entities), PinPhase::Failed);

        let mut outcome = RunOutcome::default();
        outcome.tests.insert("TestFoo".to_string(), true);
        assert_eq!(phase_for(&outcome, &entities[..1].to_vec()), PinPhase::Passed);
        assert_eq!(phase_for(&outcome, &entities), PinPhase::Unknown);

        let outcome = RunOutcome {
            build_failed: true,
            ..Default::default()
        };
        assert_eq!(phase_for(&outcome, &entities), PinPhase::BuildFailed);
    }

    #[test]
    fn test_run_dir_falls_back_to_cwd() {
        assert_eq!(run_dir(Path::new("pkg/a_test.go")), PathBuf::from("pkg"));
        assert_eq!(run_dir(Path::new("a_test.go")), PathBuf::from("."));
    }
}
