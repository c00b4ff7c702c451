use crate::config::GoConfig;
use crate::runner::{ToolchainError, ToolchainResult};
use crate::types::SymbolDeclaration;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Queries the external workspace-symbol tool for declarations matching
/// `query` under `workspace`.
///
/// Cancelling the token kills the in-flight process; the partially written
/// output is discarded.
pub async fn workspace_symbols(
    config: &GoConfig,
    workspace: &Path,
    query: &str,
    token: &CancellationToken,
) -> ToolchainResult<Vec<SymbolDeclaration>> {
    let mut cmd = Command::new(&config.symbols_binary);
    cmd.arg(workspace)
        .arg(query)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    for (key, value) in &config.env {
        cmd.env(key, value);
    }

    debug!(workspace = %workspace.display(), query, "querying workspace symbols");
    let child = cmd.spawn().map_err(|source| ToolchainError::Launch {
        tool: config.symbols_binary.clone(),
        source,
    })?;

    let output = tokio::select! {
        output = child.wait_with_output() => output?,
        _ = token.cancelled() => return Err(ToolchainError::Cancelled),
    };

    if !output.status.success() {
        return Err(ToolchainError::UnusableOutput {
            tool: config.symbols_binary.clone(),
            message: format!("exit status {:?}", output.status.code()),
        });
    }

    let declarations: Vec<SymbolDeclaration> = serde_json::from_slice(&output.stdout)?;
    Ok(declarations)
}
