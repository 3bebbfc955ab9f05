//! Helpers for running external commands with timeouts, cancellation and
//! bounded output.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use crate::error::LaunchError;

/// Default cap on captured stdout/stderr per stream.
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 64 * 1024;

/// Where a command's stdout/stderr go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Capture up to `limit_bytes` per stream; the rest is drained and dropped.
    Capture { limit_bytes: usize },
    /// Connect straight through to the launcher's own stdout/stderr.
    Inherit,
}

/// Result of a finished (or killed) external command.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
    /// The cancellation token fired and the command was killed.
    pub interrupted: bool,
}

impl CommandOutput {
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }

    /// Turn an unsuccessful run into an error naming `what` failed.
    ///
    /// Interruption maps to [`LaunchError::Interrupted`] so callers can stop
    /// instead of retrying.
    pub fn check(&self, what: &str, timeout: Option<Duration>) -> Result<()> {
        if self.interrupted {
            return Err(LaunchError::Interrupted.into());
        }
        if self.timed_out {
            let secs = timeout.map(|t| t.as_secs()).unwrap_or_default();
            return Err(anyhow!("{what} timed out after {secs}s"));
        }
        if !self.status.success() {
            let stderr = self.stderr_lossy();
            let code = self.status.code();
            if stderr.is_empty() {
                return Err(anyhow!("{what} failed with status {code:?}"));
            }
            return Err(anyhow!("{what} failed with status {code:?}: {stderr}"));
        }
        Ok(())
    }
}

type StreamRead = std::io::Result<(Vec<u8>, usize)>;

enum Waited {
    Finished(StreamRead, StreamRead, std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Run a command to completion, honoring `timeout` and `cancel`.
///
/// On timeout or cancellation the child is killed and reaped before
/// returning; captured output from a killed child is discarded. Spawn
/// failures are errors; a non-zero exit is reported through
/// [`CommandOutput::check`].
#[instrument(skip_all, fields(timeout_secs = timeout.map(|t| t.as_secs())))]
pub async fn run_command(
    mut cmd: Command,
    mode: OutputMode,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null()).kill_on_drop(true);
    let limit = match mode {
        OutputMode::Capture { limit_bytes } => {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            limit_bytes
        }
        OutputMode::Inherit => {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            0
        }
    };

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let waited = {
        let finish = async {
            tokio::join!(
                read_stream_limited(stdout, limit),
                read_stream_limited(stderr, limit),
                child.wait()
            )
        };
        let deadline = async {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            (out, err, status) = finish => Waited::Finished(out, err, status),
            () = deadline => Waited::TimedOut,
            () = cancel.cancelled() => Waited::Cancelled,
        }
    };

    let (stdout, stderr, status, timed_out, interrupted) = match waited {
        Waited::Finished(out, err, status) => {
            let status = status.context("wait for command")?;
            (
                out.context("read stdout")?,
                err.context("read stderr")?,
                status,
                false,
                false,
            )
        }
        Waited::TimedOut => {
            warn!(timeout_secs = ?timeout.map(|t| t.as_secs()), "command timed out, killing");
            let status = kill_and_reap(&mut child).await?;
            ((Vec::new(), 0), (Vec::new(), 0), status, true, false)
        }
        Waited::Cancelled => {
            debug!("command cancelled, killing");
            let status = kill_and_reap(&mut child).await?;
            ((Vec::new(), 0), (Vec::new(), 0), status, false, true)
        }
    };

    let (stdout, stdout_truncated) = stdout;
    let (stderr, stderr_truncated) = stderr;
    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, interrupted, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
        interrupted,
    })
}

async fn kill_and_reap(child: &mut tokio::process::Child) -> Result<ExitStatus> {
    child.kill().await.context("kill command")?;
    child.wait().await.context("wait command after kill")
}

async fn read_stream_limited<R: AsyncRead + Unpin>(
    reader: Option<R>,
    limit: usize,
) -> std::io::Result<(Vec<u8>, usize)> {
    let Some(mut reader) = reader else {
        return Ok((Vec::new(), 0));
    };
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}
