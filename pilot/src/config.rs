use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use toolchain::GoConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Editor-side configuration, loadable from an `autopin.toml` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PilotConfig {
    /// Whether inline code-lens actions are offered at all.
    pub code_lens: bool,
    /// Window for coalescing file-system event bursts.
    pub autorun_debounce_ms: u64,
    /// Request a coverage profile for pinned runs.
    pub coverage_on_pin: bool,
    /// Toolchain invocation settings.
    pub go: GoConfig,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            code_lens: true,
            autorun_debounce_ms: 200,
            coverage_on_pin: true,
            go: GoConfig::default(),
        }
    }
}

impl PilotConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_code_lens(mut self, enabled: bool) -> Self {
        self.code_lens = enabled;
        self
    }

    pub fn with_autorun_debounce(mut self, window: Duration) -> Self {
        self.autorun_debounce_ms = window.as_millis() as u64;
        self
    }

    pub fn with_coverage_on_pin(mut self, enabled: bool) -> Self {
        self.coverage_on_pin = enabled;
        self
    }

    pub fn with_go(mut self, go: GoConfig) -> Self {
        self.go = go;
        self
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.autorun_debounce_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.autorun_debounce_ms == 0 {
            return Err("Debounce window must be greater than 0".to_string());
        }
        self.go.validate()
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&text)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }
}
