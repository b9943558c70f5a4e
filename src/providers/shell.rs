//! Shell command runner
//!
//! Runs commands through a POSIX shell (`sh -c`, or `zsh -c` on macOS) with
//! piped output. The child is killed when its timeout elapses or when the
//! calling future is dropped.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{CommandOutput, ShellRunner};
use crate::error::{ProviderError, ProviderResult};

#[cfg(target_os = "macos")]
const DEFAULT_SHELL: &str = "/bin/zsh";
#[cfg(not(target_os = "macos"))]
const DEFAULT_SHELL: &str = "/bin/sh";

/// [`ShellRunner`] backed by a local shell
#[derive(Debug, Clone)]
pub struct SystemShell {
    shell: PathBuf,
    working_dir: Option<PathBuf>,
}

impl Default for SystemShell {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemShell {
    /// Uses the platform default shell
    pub fn new() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            working_dir: None,
        }
    }

    /// Uses a specific shell binary
    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Runs commands in `dir` instead of the server's working directory
    pub fn with_working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }
}

#[async_trait]
impl ShellRunner for SystemShell {
    async fn run_command(&self, command: &str, timeout: Duration) -> ProviderResult<CommandOutput> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| {
            ProviderError::failed(
                "run_command",
                format!("failed to spawn {}: {}", self.shell.display(), e),
            )
        })?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                debug!(
                    "Command exited with {:?} ({} bytes stdout)",
                    output.status.code(),
                    output.stdout.len()
                );
                Ok(CommandOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code: output.status.code().unwrap_or(-1),
                })
            }
            Ok(Err(e)) => Err(ProviderError::failed("run_command", e.to_string())),
            // Dropping the wait future drops the child, which kills it.
            Err(_) => Err(ProviderError::CommandTimedOut {
                seconds: timeout.as_secs(),
            }),
        }
    }
}
