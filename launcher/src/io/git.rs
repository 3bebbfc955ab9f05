//! Git adapter for the source acquisition path.
//!
//! The launcher only ever needs a shallow clone of one branch followed by
//! removal of the version-control metadata, so the wrapper stays small.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::io::process::{DEFAULT_OUTPUT_LIMIT_BYTES, OutputMode, run_command};

/// Clone URL carrying `token` as the transport credential.
///
/// The result contains the raw token: log it only through a
/// [`crate::core::mask::Redactor`].
pub fn authenticated_url(host: &str, repository: &str, token: &str) -> String {
    let repository = repository.trim_matches('/').trim_end_matches(".git");
    format!("https://oauth2:{token}@{host}/{repository}.git")
}

/// Abstraction over source fetching backends.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Shallow-clone `branch` of `url` into `dest`, which must not exist.
    async fn clone_shallow(
        &self,
        url: &str,
        branch: &str,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Fetcher that spawns `git`.
#[derive(Debug, Clone)]
pub struct GitCli {
    timeout: Duration,
}

impl GitCli {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl SourceFetcher for GitCli {
    #[instrument(skip_all, fields(branch, dest = %dest.display()))]
    async fn clone_shallow(
        &self,
        url: &str,
        branch: &str,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut cmd = Command::new("git");
        cmd.args(["clone", "--depth", "1", "--branch", branch, url])
            .arg(dest)
            .env("GIT_TERMINAL_PROMPT", "0");

        let output = run_command(
            cmd,
            OutputMode::Capture {
                limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            },
            Some(self.timeout),
            cancel,
        )
        .await
        .context("run git clone")?;
        output.check("git clone", Some(self.timeout))?;
        debug!("clone finished");
        Ok(())
    }
}

/// Remove the `.git` directory from a cloned tree.
///
/// Returns `Ok(false)` if there was none. The checkout is a disposable
/// deployment artifact; its history is not kept.
pub async fn remove_git_metadata(dir: &Path) -> Result<bool> {
    let git_dir = dir.join(".git");
    if !git_dir.exists() {
        return Ok(false);
    }
    tokio::fs::remove_dir_all(&git_dir)
        .await
        .with_context(|| format!("remove {}", git_dir.display()))?;
    Ok(true)
}
