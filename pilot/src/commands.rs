//! Command dispatch: the glue between host command invocations (palette
//! entries, code-lens clicks) and the coordinator.
//!
//! Precondition violations surface as informational pop-ups; anything else
//! is logged and swallowed so a failed run never breaks the host.

use crate::codelens::LensCommand;
use crate::coordinator::{PilotError, PinCoordinator};
use crate::host::{EditorContext, EditorHost};
use std::sync::Arc;
use tracing::error;
use toolchain::{TestEntity, TestFlavor};

pub async fn execute(
    coordinator: &Arc<PinCoordinator>,
    host: &Arc<dyn EditorHost>,
    command: LensCommand,
    editor: Option<&EditorContext>,
    entity: Option<TestEntity>,
) {
    match command {
        LensCommand::PinTest => {
            let Some(editor) = editor else {
                host.show_info(&PilotError::NoActiveEditor.to_string());
                return;
            };
            if let Err(err) = coordinator
                .pin_at_cursor(editor, TestFlavor::Test, entity)
                .await
            {
                match err {
                    PilotError::NoActiveEditor
                    | PilotError::NotATestFile
                    | PilotError::NoTestAtCursor => host.show_info(&err.to_string()),
                    other => error!("pin command failed: {other}"),
                }
            }
        }
        LensCommand::ClearPin => coordinator.clear_pinned(),
        LensCommand::ShowPinnedOutput => coordinator.show_pinned_output(),
        LensCommand::ShowFileOutput => coordinator.show_file_output(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PilotConfig;
    use crate::coverage::CoverageTracker;
    use crate::host::{
        HostSurfaces, MemoryDiagnostics, MemoryHost, MemoryOutputFactory, MemoryStatus,
        ViewRegistry,
    };
    use async_trait::async_trait;
    use std::path::Path;
    use tokio_util::sync::CancellationToken;
    use toolchain::{RunOutcome, RunRequest, TestLocator, TestRunner, ToolchainResult};

    struct NoopRunner;

    #[async_trait]
    impl TestRunner for NoopRunner {
        async fn run(&self, _request: &RunRequest) -> ToolchainResult<RunOutcome> {
            Ok(RunOutcome::default())
        }

        fn runner_name(&self) -> &'static str {
            "noop"
        }
    }

    struct EmptyLocator;

    #[async_trait]
    impl TestLocator for EmptyLocator {
        async fn test_entities(
            &self,
            _file: &Path,
            _flavor: TestFlavor,
            _token: &CancellationToken,
        ) -> ToolchainResult<Vec<TestEntity>> {
            Ok(Vec::new())
        }
    }

    fn coordinator_with_host() -> (Arc<PinCoordinator>, Arc<MemoryHost>) {
        let host = MemoryHost::new();
        let surfaces = HostSurfaces {
            editor: host.clone(),
            outputs: MemoryOutputFactory::new(),
            status: MemoryStatus::new(),
            pin_diagnostics: MemoryDiagnostics::new(),
            file_diagnostics: MemoryDiagnostics::new(),
        };
        let coordinator = PinCoordinator::new(
            Arc::new(NoopRunner),
            Arc::new(EmptyLocator),
            Arc::new(CoverageTracker::new(ViewRegistry::new())),
            surfaces,
            PilotConfig::default(),
        );
        (coordinator, host)
    }

    #[tokio::test]
    async fn test_pin_without_editor_shows_info() {
        let (coordinator, host) = coordinator_with_host();
        let editor_host: Arc<dyn EditorHost> = host.clone();

        execute(&coordinator, &editor_host, LensCommand::PinTest, None, None).await;
        assert_eq!(host.messages(), vec!["No editor is active.".to_string()]);
    }

    #[tokio::test]
    async fn test_pin_in_non_test_file_shows_info() {
        let (coordinator, host) = coordinator_with_host();
        let editor_host: Arc<dyn EditorHost> = host.clone();
        let editor = EditorContext::new("/ws/pkg/sample.go", toolchain::Position::new(0, 0));

        execute(
            &coordinator,
            &editor_host,
            LensCommand::PinTest,
            Some(&editor),
            None,
        )
        .await;
        assert_eq!(
            host.messages(),
            vec!["No tests found. Current file is not a test file.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_pin_with_no_entity_shows_info() {
        let (coordinator, host) = coordinator_with_host();
        let editor_host: Arc<dyn EditorHost> = host.clone();
        let editor = EditorContext::new("/ws/pkg/sample_test.go", toolchain::Position::new(0, 0));

        execute(
            &coordinator,
            &editor_host,
            LensCommand::PinTest,
            Some(&editor),
            None,
        )
        .await;
        assert_eq!(
            host.messages(),
            vec!["No test function found at cursor.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_clear_command_is_safe_without_pin() {
        let (coordinator, host) = coordinator_with_host();
        let editor_host: Arc<dyn EditorHost> = host.clone();

        execute(&coordinator, &editor_host, LensCommand::ClearPin, None, None).await;
        execute(
            &coordinator,
            &editor_host,
            LensCommand::ShowPinnedOutput,
            None,
            None,
        )
        .await;
        assert!(host.messages().is_empty());
    }
}
