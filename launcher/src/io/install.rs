//! Dependency installer adapter for the cloned artifact.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::io::process::{OutputMode, run_command};

#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub workdir: PathBuf,
    pub timeout: Duration,
}

/// How the dependency install went. Only `Installed` and `Skipped` mean the
/// tree is known to be complete; `Failed` is reported as a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    Failed(String),
    /// No dependency manifest in the artifact.
    Skipped,
}

/// Abstraction over dependency installers.
#[async_trait]
pub trait DependencyInstaller: Send + Sync {
    async fn install(&self, request: &InstallRequest, cancel: &CancellationToken) -> Result<()>;
}

/// Installer that runs a configured command (by default `npm install --production`).
#[derive(Debug, Clone)]
pub struct CommandInstaller {
    command: Vec<String>,
}

impl CommandInstaller {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl DependencyInstaller for CommandInstaller {
    #[instrument(skip_all, fields(workdir = %request.workdir.display()))]
    async fn install(&self, request: &InstallRequest, cancel: &CancellationToken) -> Result<()> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("install command is empty"))?;
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(&request.workdir);
        let output = run_command(cmd, OutputMode::Inherit, Some(request.timeout), cancel).await?;
        output.check(program, Some(request.timeout))
    }
}

/// Install dependencies if `manifest` exists; otherwise skip.
///
/// Installer errors become [`InstallOutcome::Failed`] rather than `Err`,
/// except interruption, which the caller must see.
pub async fn install_if_needed(
    manifest: &Path,
    installer: &dyn DependencyInstaller,
    request: &InstallRequest,
    cancel: &CancellationToken,
) -> Result<InstallOutcome> {
    if !manifest.exists() {
        return Ok(InstallOutcome::Skipped);
    }
    match installer.install(request, cancel).await {
        Ok(()) => Ok(InstallOutcome::Installed),
        Err(err) if cancel.is_cancelled() => Err(err),
        Err(err) => Ok(InstallOutcome::Failed(format!("{err:#}"))),
    }
}
