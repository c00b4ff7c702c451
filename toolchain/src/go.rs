use crate::config::GoConfig;
use crate::runner::{TestRunner, ToolchainError, ToolchainResult};
use crate::types::{CheckDiagnostic, CheckSeverity, RunOutcome, RunRequest, TestFlavor};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// go test -v result lines: `--- PASS: TestFoo (0.01s)`
static TEST_RESULT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^--- (PASS|FAIL): (\S+)").expect("valid regex"));

// Benchmark result lines carry a -GOMAXPROCS suffix: `BenchmarkFoo-8  ...`
static BENCH_RESULT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(Benchmark\w+)(?:-\d+)?\s+\d").expect("valid regex"));

// Compiler/vet diagnostics: `./file.go:12:4: message` (column optional)
static CHECK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\./)?(\S+?\.go):(\d+)(?::(\d+))?:\s*(.+)$").expect("valid regex"));

/// Shells out to the unmodified `go` binary and scrapes its textual output.
pub struct GoToolchain {
    config: GoConfig,
}

impl GoToolchain {
    pub fn new(config: GoConfig) -> ToolchainResult<Self> {
        config
            .validate()
            .map_err(|msg| ToolchainError::InvalidConfig { message: msg })?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GoConfig {
        &self.config
    }

    fn command(&self, dir: &Path) -> Command {
        let mut cmd = Command::new(&self.config.go_binary);
        cmd.current_dir(dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }
        cmd
    }

    fn test_args(&self, request: &RunRequest) -> Vec<String> {
        let mut args = vec![
            "test".to_string(),
            "-v".to_string(),
            "-timeout".to_string(),
            format!("{}s", self.config.timeout.as_secs()),
        ];

        if let Some(tags) = &self.config.build_tags {
            args.push("-tags".to_string());
            args.push(tags.clone());
        }

        args.extend(self.config.test_flags.iter().cloned());
        args.extend(request.flags.iter().cloned());

        if let Some(profile) = &request.coverage_profile {
            args.push("-coverprofile".to_string());
            args.push(profile.display().to_string());
        }

        let pattern = selection_pattern(&request.entities.iter().collect::<Vec<_>>());
        match request.flavor {
            TestFlavor::Test => {
                args.push("-run".to_string());
                args.push(pattern);
            }
            TestFlavor::Benchmark => {
                args.push("-bench".to_string());
                args.push(pattern);
                // Don't also run every ordinary test in the package.
                args.push("-run".to_string());
                args.push("^$".to_string());
            }
        }

        args
    }

    async fn capture(&self, mut cmd: Command, tool: &str) -> ToolchainResult<(String, bool)> {
        let child = cmd.spawn().map_err(|source| ToolchainError::Launch {
            tool: tool.to_string(),
            source,
        })?;

        let output = tokio::time::timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| ToolchainError::Timeout {
                seconds: self.config.timeout.as_secs(),
            })??;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&stderr);
        }

        Ok((text, output.status.success()))
    }

    /// Type-checks the package in `dir` the way the build would, returning
    /// one diagnostic per compiler error. Test packages are compiled with
    /// `go test -c` so that _test.go files participate.
    pub async fn check(&self, dir: &Path, is_test_package: bool) -> ToolchainResult<Vec<CheckDiagnostic>> {
        let scratch = std::env::temp_dir().join("autopin-build-check");
        let mut args: Vec<String> = if is_test_package {
            vec!["test".to_string(), "-c".to_string()]
        } else {
            vec!["build".to_string()]
        };
        args.push("-o".to_string());
        args.push(scratch.display().to_string());
        if let Some(tags) = &self.config.build_tags {
            args.push("-tags".to_string());
            args.push(tags.clone());
        }

        debug!(dir = %dir.display(), ?args, "running build check");
        let mut cmd = self.command(dir);
        cmd.args(&args);
        let (output, ok) = self.capture(cmd, "go build").await?;
        if ok {
            return Ok(Vec::new());
        }
        Ok(parse_check_output(&output, CheckSeverity::Error))
    }

    /// Runs `go vet ./...` in `dir`. Cancelling the token kills the
    /// in-flight process and yields `ToolchainError::Cancelled`.
    pub async fn vet(&self, dir: &Path, token: &CancellationToken) -> ToolchainResult<Vec<CheckDiagnostic>> {
        let mut args = vec!["vet".to_string()];
        if let Some(tags) = &self.config.build_tags {
            args.push("-tags".to_string());
            args.push(tags.clone());
        }
        args.push("./...".to_string());

        debug!(dir = %dir.display(), "running go vet");
        let mut cmd = self.command(dir);
        cmd.args(&args);

        tokio::select! {
            result = self.capture(cmd, "go vet") => {
                let (output, ok) = result?;
                if ok {
                    Ok(Vec::new())
                } else {
                    Ok(parse_check_output(&output, CheckSeverity::Warning))
                }
            }
            // kill_on_drop reaps the child when the capture future is dropped
            _ = token.cancelled() => {
                warn!("go vet cancelled");
                Err(ToolchainError::Cancelled)
            }
        }
    }
}

#[async_trait]
impl TestRunner for GoToolchain {
    async fn run(&self, request: &RunRequest) -> ToolchainResult<RunOutcome> {
        if request.entities.is_empty() {
            return Ok(RunOutcome {
                success: true,
                ..Default::default()
            });
        }

        let args = self.test_args(request);
        info!(
            dir = %request.dir.display(),
            targets = ?request.entity_names(),
            "invoking go test"
        );

        let mut cmd = self.command(&request.dir);
        cmd.args(&args);
        let (output, ok) = self.capture(cmd, "go test").await?;
        let outcome = parse_test_output(&output, ok, request.flavor);
        debug!(
            success = outcome.success,
            build_failed = outcome.build_failed,
            results = outcome.tests.len(),
            "go test finished"
        );
        Ok(outcome)
    }

    fn runner_name(&self) -> &'static str {
        "go"
    }
}

/// Anchored alternation matching exactly the named entities.
fn selection_pattern(entities: &[&crate::types::TestEntity]) -> String {
    let names: Vec<String> = entities.iter().map(|e| regex::escape(&e.name)).collect();
    format!("^({})$", names.join("|"))
}

fn parse_test_output(output: &str, exit_ok: bool, flavor: TestFlavor) -> RunOutcome {
    let mut outcome = RunOutcome {
        success: exit_ok,
        ..Default::default()
    };

    for line in output.lines() {
        let line = line.trim_start();
        if let Some(caps) = TEST_RESULT_LINE.captures(line) {
            let passed = &caps[1] == "PASS";
            outcome.tests.insert(caps[2].to_string(), passed);
        } else if flavor == TestFlavor::Benchmark {
            if let Some(caps) = BENCH_RESULT_LINE.captures(line) {
                // A benchmark that printed a stats line completed; failures
                // show up as `--- FAIL:` and are handled above.
                outcome.tests.entry(caps[1].to_string()).or_insert(true);
            }
        }
    }

    if output.contains("[build failed]")
        || output.contains("[setup failed]")
        || (!exit_ok && outcome.tests.is_empty() && output.lines().any(|l| l.starts_with("# ")))
    {
        outcome.build_failed = true;
    }

    outcome
}

fn parse_check_output(output: &str, severity: CheckSeverity) -> Vec<CheckDiagnostic> {
    let mut diagnostics = Vec::new();
    for line in output.lines() {
        if line.starts_with('#') || line.starts_with("go:") {
            continue;
        }
        if let Some(caps) = CHECK_LINE.captures(line) {
            diagnostics.push(CheckDiagnostic {
                file: caps[1].into(),
                line: caps[2].parse().unwrap_or(1),
                column: caps.get(3).and_then(|c| c.as_str().parse().ok()),
                message: caps[4].to_string(),
                severity,
            });
        }
    }
    diagnostics
}
