use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::services::VersionControlService;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GitCli {
    workspace_root: PathBuf,
    timeout: Duration,
}

impl GitCli {
    /// Validates that `root` holds a `.git` entry (a directory, or a file for
    /// worktrees and submodules) and canonicalises it.
    pub fn open(root: &Path) -> AppResult<Self> {
        let not_a_repo = || AppError::NotARepository {
            path: root.to_path_buf(),
        };
        if !root.join(".git").exists() {
            return Err(not_a_repo());
        }
        let workspace_root = root.canonicalize().map_err(|_| not_a_repo())?;

        Ok(Self {
            workspace_root,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl VersionControlService for GitCli {
    fn root(&self) -> &Path {
        &self.workspace_root
    }

    async fn run(&self, args: &[String]) -> AppResult<String> {
        let command = args.first().cloned().unwrap_or_default();
        debug!(args = ?args, "running git");

        // Paths are printed verbatim instead of as quoted octal escapes.
        let future = Command::new("git")
            .args(["-c", "core.quotepath=false"])
            .args(args)
            .current_dir(&self.workspace_root)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, future).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(AppError::CommandFailed {
                    command,
                    stderr: format!("timed out after {}s", self.timeout.as_secs()),
                });
            }
        };

        if !output.status.success() {
            return Err(AppError::CommandFailed {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(decode_output(output.stdout).trim_end().to_string())
    }
}

/// Decodes command output, dropping byte sequences that are not valid UTF-8.
fn decode_output(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            debug!("git output is not valid UTF-8, decoding leniently");
            String::from_utf8_lossy(err.as_bytes()).replace(char::REPLACEMENT_CHARACTER, "")
        }
    }
}
