//! Container engine abstraction.
//!
//! The [`ContainerEngine`] trait decouples the container acquisition path
//! from the engine CLI. Tests use the scripted engine in
//! [`crate::test_support`] instead of spawning processes.

use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::io::config::Tunables;
use crate::io::process::{DEFAULT_OUTPUT_LIMIT_BYTES, OutputMode, run_command};

/// Everything needed to start the artifact container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub name: String,
    pub image: String,
    pub restart_policy: String,
    /// Environment injected into the container, in order.
    pub env: Vec<(String, String)>,
    pub volume: String,
    pub mount_path: String,
}

impl RunSpec {
    /// Arguments for `<engine> run`. Values are passed as separate argv
    /// entries, so they never go through a shell.
    pub fn run_args(&self) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            self.name.clone(),
            "--restart".to_string(),
            self.restart_policy.clone(),
        ];
        for (key, value) in &self.env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        args.push("-v".to_string());
        args.push(format!("{}:{}", self.volume, self.mount_path));
        args.push(self.image.clone());
        args
    }
}

/// Abstraction over container engines.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// True if the engine CLI answers a version query.
    async fn is_available(&self) -> bool;

    /// Pull `image`. Pulling an image that is already present succeeds.
    async fn pull(&self, image: &str, cancel: &CancellationToken) -> Result<()>;

    /// Stop and remove the container called `name`.
    ///
    /// Returns `Ok(false)` when no such container exists.
    async fn remove(&self, name: &str) -> Result<bool>;

    /// Start a detached container. The error carries the engine's own message.
    async fn run(&self, spec: &RunSpec, cancel: &CancellationToken) -> Result<()>;

    /// Stream the container's logs to our stdout until the follower exits or
    /// `cancel` fires. Cancellation is a normal return.
    async fn follow_logs(&self, name: &str, cancel: &CancellationToken) -> Result<()>;
}

/// Engine driven through the `docker` CLI (or a compatible one).
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
    pull_timeout: Duration,
    probe_timeout: Duration,
}

impl DockerCli {
    pub fn new(tunables: &Tunables) -> Self {
        Self {
            program: tunables.container.engine.clone(),
            pull_timeout: tunables.timeouts.pull_timeout(),
            probe_timeout: tunables.timeouts.probe_timeout(),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        cmd
    }

    async fn capture(&self, args: &[&str]) -> Result<crate::io::process::CommandOutput> {
        run_command(
            self.command(args),
            OutputMode::Capture {
                limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            },
            Some(self.probe_timeout),
            &CancellationToken::new(),
        )
        .await
    }
}

#[async_trait]
impl ContainerEngine for DockerCli {
    #[instrument(skip_all, fields(engine = %self.program))]
    async fn is_available(&self) -> bool {
        match self.capture(&["--version"]).await {
            Ok(output) if output.status.success() => {
                debug!(version = %output.stdout_lossy(), "container engine available");
                true
            }
            Ok(output) => {
                debug!(exit_code = ?output.status.code(), "container engine unusable");
                false
            }
            Err(err) => {
                debug!(err = %err, "container engine not found");
                false
            }
        }
    }

    #[instrument(skip_all, fields(image = %image))]
    async fn pull(&self, image: &str, cancel: &CancellationToken) -> Result<()> {
        let output = run_command(
            self.command(&["pull", image]),
            OutputMode::Inherit,
            Some(self.pull_timeout),
            cancel,
        )
        .await?;
        output.check(&format!("{} pull", self.program), Some(self.pull_timeout))
    }

    #[instrument(skip_all, fields(container = name))]
    async fn remove(&self, name: &str) -> Result<bool> {
        let stop = self.capture(&["stop", name]).await?;
        if !stop.status.success() {
            let stderr = stop.stderr_lossy();
            if is_missing_container(&stderr) {
                debug!("no previous container");
                return Ok(false);
            }
            warn!(stderr = %stderr, "stop failed, removing anyway");
        }
        let rm = self.capture(&["rm", "-f", name]).await?;
        if !rm.status.success() {
            let stderr = rm.stderr_lossy();
            if is_missing_container(&stderr) {
                return Ok(false);
            }
            return Err(anyhow!("{} rm {name} failed: {stderr}", self.program));
        }
        Ok(true)
    }

    #[instrument(skip_all, fields(container = %spec.name, image = %spec.image))]
    async fn run(&self, spec: &RunSpec, cancel: &CancellationToken) -> Result<()> {
        let args = spec.run_args();
        let mut cmd = Command::new(&self.program);
        cmd.args(&args);
        let output = run_command(
            cmd,
            OutputMode::Capture {
                limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            },
            Some(self.pull_timeout),
            cancel,
        )
        .await?;
        output.check(&format!("{} run", self.program), Some(self.pull_timeout))?;
        info!(container_id = %output.stdout_lossy(), "container started");
        Ok(())
    }

    #[instrument(skip_all, fields(container = name))]
    async fn follow_logs(&self, name: &str, cancel: &CancellationToken) -> Result<()> {
        let output = run_command(
            self.command(&["logs", "-f", name]),
            OutputMode::Inherit,
            None,
            cancel,
        )
        .await?;
        if output.interrupted {
            debug!("log attachment cancelled");
        } else if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "log follower exited with an error");
        }
        Ok(())
    }
}

fn is_missing_container(stderr: &str) -> bool {
    stderr.contains("No such container") || stderr.contains("no such container")
}
