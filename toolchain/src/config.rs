use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for invoking the Go toolchain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoConfig {
    /// Path or name of the go binary.
    pub go_binary: String,
    /// Path or name of the external workspace-symbol tool.
    pub symbols_binary: String,
    /// Flags appended to every `go test` invocation.
    pub test_flags: Vec<String>,
    /// Value passed via `-tags` when set.
    pub build_tags: Option<String>,
    /// Extra environment variables for tool processes.
    pub env: Vec<(String, String)>,
    /// Per-invocation timeout.
    pub timeout: Duration,
}

impl Default for GoConfig {
    fn default() -> Self {
        Self {
            go_binary: "go".to_string(),
            symbols_binary: "go-symbols".to_string(),
            test_flags: Vec::new(),
            build_tags: None,
            env: Vec::new(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl GoConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_go_binary(mut self, binary: impl Into<String>) -> Self {
        self.go_binary = binary.into();
        self
    }

    pub fn with_symbols_binary(mut self, binary: impl Into<String>) -> Self {
        self.symbols_binary = binary.into();
        self
    }

    pub fn with_test_flags(mut self, flags: Vec<String>) -> Self {
        self.test_flags = flags;
        self
    }

    pub fn with_build_tags(mut self, tags: impl Into<String>) -> Self {
        self.build_tags = Some(tags.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.go_binary.is_empty() {
            return Err("go binary cannot be empty".to_string());
        }

        if self.symbols_binary.is_empty() {
            return Err("symbols binary cannot be empty".to_string());
        }

        if self.timeout.is_zero() {
            return Err("Timeout must be greater than 0".to_string());
        }

        if self.test_flags.iter().any(|f| f == "-run" || f == "-bench") {
            return Err("test flags must not override -run/-bench selection".to_string());
        }

        Ok(())
    }
}
