// src/utils/shell.rs
use std::path::Path;
use std::process::Output;
use anyhow::{Result, Context};
use tokio::process::Command;
use tracing::{debug, trace, warn};

/// Execute a shell command inside `dir`
pub async fn execute_command_in(cmd: &str, dir: &Path) -> Result<Output> {
    debug!("Executing command in {}: {}", dir.display(), cmd);

    let output = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .current_dir(dir)
        .output()
        .await
        .context(format!("Failed to execute command: {}", cmd))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!("Command failed: {}\nStderr: {}", cmd, stderr);
    } else {
        trace!("Command succeeded: {}", cmd);
    }

    Ok(output)
}
