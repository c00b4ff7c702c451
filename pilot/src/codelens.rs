//! Inline pin/show-output actions derived from document entities and the
//! current pin/result state. Recomputed freshly on every request.

use crate::coordinator::PinCoordinator;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use toolchain::{Range, TestEntity, TestFlavor, TestLocator};

/// Commands a lens can invoke, abstract of any host command syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LensCommand {
    PinTest,
    ClearPin,
    ShowPinnedOutput,
    ShowFileOutput,
}

#[derive(Debug, Clone)]
pub struct CodeLens {
    pub range: Range,
    pub title: String,
    pub command: LensCommand,
    /// Entity argument carried by pin actions.
    pub entity: Option<TestEntity>,
}

pub struct TestCodeLensProvider {
    coordinator: Arc<PinCoordinator>,
    locator: Arc<dyn TestLocator>,
    enabled: AtomicBool,
}

impl TestCodeLensProvider {
    pub fn new(
        coordinator: Arc<PinCoordinator>,
        locator: Arc<dyn TestLocator>,
        enabled: bool,
    ) -> Self {
        Self {
            coordinator,
            locator,
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        if self.enabled.swap(enabled, Ordering::SeqCst) != enabled {
            self.coordinator.notifier().fire();
        }
    }

    /// Compute the lenses for a document. Cancellation mid-flight returns
    /// whatever was assembled so far; dropping partial results is fine.
    pub async fn provide(&self, document: &Path, token: &CancellationToken) -> Vec<CodeLens> {
        if !self.enabled.load(Ordering::SeqCst) || !self.locator.is_test_file(document) {
            return Vec::new();
        }

        let entities = match self
            .locator
            .test_entities(document, TestFlavor::Test, token)
            .await
        {
            Ok(entities) => entities,
            Err(_) => return Vec::new(),
        };

        let mut lenses = Vec::new();
        for entity in entities {
            if token.is_cancelled() {
                break;
            }

            if self.coordinator.is_pinned(&entity.name) {
                lenses.push(CodeLens {
                    range: entity.range,
                    title: "remove pin".to_string(),
                    command: LensCommand::ClearPin,
                    entity: None,
                });
                if let Some(passed) = self.coordinator.pin_result_for(&entity.name) {
                    lenses.push(CodeLens {
                        range: entity.range,
                        title: labeled("show output", passed),
                        command: LensCommand::ShowPinnedOutput,
                        entity: None,
                    });
                }
            } else {
                lenses.push(CodeLens {
                    range: entity.range,
                    title: "pin test".to_string(),
                    command: LensCommand::PinTest,
                    entity: Some(entity.clone()),
                });
                if let Some(passed) = self.coordinator.file_result_for(&entity.name) {
                    lenses.push(CodeLens {
                        range: entity.range,
                        title: labeled("show file output", passed),
                        command: LensCommand::ShowFileOutput,
                        entity: None,
                    });
                }
            }
        }

        lenses
    }
}

fn labeled(title: &str, passed: bool) -> String {
    format!("{} ({})", title, if passed { "ok" } else { "FAIL" })
}
