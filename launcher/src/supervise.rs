//! Run the artifact as a child process and relay shutdown signals to it.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tracing::{info, instrument, warn};

use crate::error::LaunchError;
use crate::exit_codes;
use crate::io::config::ArtifactPaths;
use crate::signals::{Shutdown, ShutdownKind};

/// The artifact's entry point and the program that runs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisedProcess {
    pub workdir: PathBuf,
    pub entry: PathBuf,
    pub program: String,
}

impl SupervisedProcess {
    /// Find the entry point: the acquired artifact directory first, then the
    /// launcher root.
    pub fn locate(paths: &ArtifactPaths, program: &str) -> Result<Self, LaunchError> {
        let candidates = [
            (&paths.artifact_dir, &paths.artifact_entry),
            (&paths.root, &paths.root_entry),
        ];
        candidates
            .into_iter()
            .find(|(_, entry)| entry.is_file())
            .map(|(workdir, entry)| Self {
                workdir: workdir.clone(),
                entry: entry.clone(),
                program: program.to_string(),
            })
            .ok_or_else(|| LaunchError::EntryPointNotFound {
                searched: vec![paths.artifact_entry.clone(), paths.root_entry.clone()],
            })
    }

    /// Start the child with inherited stdio and environment.
    pub fn spawn(&self) -> Result<Child, LaunchError> {
        Command::new(&self.program)
            .arg(&self.entry)
            .current_dir(&self.workdir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| LaunchError::ChildSpawnFailed {
                program: self.program.clone(),
                source,
            })
    }

    fn entry_name(&self) -> &Path {
        self.entry
            .strip_prefix(&self.workdir)
            .unwrap_or(self.entry.as_path())
    }
}

/// Exit code to propagate for a finished child. A signal death has no code
/// and maps to success.
pub fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(exit_codes::OK)
}

fn relay(pid: Option<u32>, kind: ShutdownKind) {
    let Some(pid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    info!(pid, signal = %kind, "relaying signal to artifact");
    if let Err(errno) = kill(Pid::from_raw(pid), kind.signal()) {
        warn!(pid, signal = %kind, error = %errno, "could not relay signal");
    }
}

/// Spawn the artifact and wait for it.
///
/// Returns the child's exit code. On SIGINT the signal is relayed and the
/// launcher returns success at once; on SIGTERM it is relayed and the
/// child's own exit code is awaited.
#[instrument(skip_all, fields(entry = %process.entry_name().display()))]
pub async fn supervise(process: &SupervisedProcess, shutdown: &mut Shutdown) -> Result<i32> {
    let mut child = process.spawn()?;
    let pid = child.id();
    info!(pid = ?pid, program = %process.program, "artifact started");

    let mut listening = true;
    loop {
        tokio::select! {
            status = child.wait() => {
                let code = exit_code(status.context("wait for artifact")?);
                info!(code, "artifact exited");
                return Ok(code);
            }
            kind = shutdown.recv(), if listening => match kind {
                Some(ShutdownKind::Interrupt) => {
                    relay(pid, ShutdownKind::Interrupt);
                    info!("launcher shutting down without waiting for the artifact");
                    return Ok(exit_codes::OK);
                }
                Some(ShutdownKind::Terminate) => {
                    relay(pid, ShutdownKind::Terminate);
                    info!("waiting for artifact to exit");
                }
                None => listening = false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::shutdown_channel;
    use std::time::Duration;

    fn paths(root: &Path) -> ArtifactPaths {
        ArtifactPaths::new(root, Path::new("core"), "index.sh")
    }

    fn script_process(dir: &Path, body: &str) -> SupervisedProcess {
        let entry = dir.join("index.sh");
        std::fs::write(&entry, body).expect("write script");
        SupervisedProcess {
            workdir: dir.to_path_buf(),
            entry,
            program: "sh".to_string(),
        }
    }

    async fn wait_for(path: &Path) {
        for _ in 0..200 {
            if path.exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{} never appeared", path.display());
    }

    #[test]
    fn locate_prefers_artifact_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = paths(dir.path());
        std::fs::write(&paths.root_entry, "").expect("write root");
        std::fs::create_dir_all(&paths.artifact_dir).expect("mkdir");
        std::fs::write(&paths.artifact_entry, "").expect("write artifact");

        let process = SupervisedProcess::locate(&paths, "node").expect("locate");
        assert_eq!(process.workdir, paths.artifact_dir);
        assert_eq!(process.entry, paths.artifact_entry);
    }

    #[test]
    fn locate_falls_back_to_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = paths(dir.path());
        std::fs::write(&paths.root_entry, "").expect("write root");

        let process = SupervisedProcess::locate(&paths, "node").expect("locate");
        assert_eq!(process.workdir, paths.root);
    }

    #[test]
    fn locate_reports_every_searched_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = paths(dir.path());
        match SupervisedProcess::locate(&paths, "node") {
            Err(LaunchError::EntryPointNotFound { searched }) => {
                assert_eq!(searched, vec![paths.artifact_entry, paths.root_entry]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn propagates_child_exit_code() {
        let dir = tempfile::tempdir().expect("tempdir");
        let process = script_process(dir.path(), "exit 7\n");
        let (_trigger, mut shutdown) = shutdown_channel();
        let code = supervise(&process, &mut shutdown).await.expect("supervise");
        assert_eq!(code, 7);
    }

    #[tokio::test]
    async fn spawn_failure_is_typed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut process = script_process(dir.path(), "exit 0\n");
        process.program = "no-such-interpreter-4f1c".to_string();
        let (_trigger, mut shutdown) = shutdown_channel();
        let err = supervise(&process, &mut shutdown).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LaunchError>(),
            Some(LaunchError::ChildSpawnFailed { .. })
        ));
    }

    #[tokio::test]
    async fn terminate_waits_for_child_exit_code() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ready = dir.path().join("ready");
        let process = script_process(
            dir.path(),
            "trap 'exit 3' TERM\ntouch ready\nwhile :; do sleep 0.05; done\n",
        );
        let (trigger, mut shutdown) = shutdown_channel();
        let supervisor = supervise(&process, &mut shutdown);
        let signaller = async {
            wait_for(&ready).await;
            trigger.fire(ShutdownKind::Terminate);
        };
        let (code, ()) = tokio::join!(supervisor, signaller);
        assert_eq!(code.expect("supervise"), 3);
    }

    #[tokio::test]
    async fn interrupt_returns_success_immediately() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ready = dir.path().join("ready");
        let process = script_process(
            dir.path(),
            "trap 'exit 9' INT\ntouch ready\nwhile :; do sleep 0.05; done\n",
        );
        let (trigger, mut shutdown) = shutdown_channel();
        let supervisor = supervise(&process, &mut shutdown);
        let signaller = async {
            wait_for(&ready).await;
            trigger.fire(ShutdownKind::Interrupt);
        };
        let (code, ()) = tokio::join!(supervisor, signaller);
        assert_eq!(code.expect("supervise"), exit_codes::OK);
    }
}
