//! Scripted backends and a throwaway launcher root for tests.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::core::config::EnvSnapshot;
use crate::io::config::{ArtifactPaths, TUNABLES_FILE, Tunables};
use crate::io::engine::{ContainerEngine, RunSpec};
use crate::io::git::SourceFetcher;
use crate::io::install::{DependencyInstaller, InstallRequest};
use crate::load::LoadContext;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Consume one scripted failure, if any are left.
fn take_failure(remaining: &Mutex<u32>) -> bool {
    let mut remaining = lock(remaining);
    if *remaining == 0 {
        return false;
    }
    *remaining -= 1;
    true
}

/// In-memory container engine. Records every call except availability checks.
#[derive(Debug, Default)]
pub struct FakeEngine {
    available: bool,
    pull_failures: Mutex<u32>,
    run_error: Option<String>,
    blocking_logs: bool,
    containers: Mutex<BTreeSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeEngine {
    pub fn available() -> Self {
        Self {
            available: true,
            ..Self::default()
        }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Fail the next `count` pulls.
    pub fn with_pull_failures(self, count: u32) -> Self {
        *lock(&self.pull_failures) = count;
        self
    }

    pub fn with_run_error(mut self, message: &str) -> Self {
        self.run_error = Some(message.to_string());
        self
    }

    /// Keep following logs until cancelled, like `logs -f` on a live container.
    pub fn with_blocking_logs(mut self) -> Self {
        self.blocking_logs = true;
        self
    }

    /// Pretend a container called `name` already exists.
    pub fn with_container(self, name: &str) -> Self {
        lock(&self.containers).insert(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn has_container(&self, name: &str) -> bool {
        lock(&self.containers).contains(name)
    }

    fn record(&self, call: String) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn pull(&self, image: &str, _cancel: &CancellationToken) -> Result<()> {
        self.record(format!("pull {image}"));
        if take_failure(&self.pull_failures) {
            return Err(anyhow!("pull {image}: connection reset by peer"));
        }
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<bool> {
        self.record(format!("remove {name}"));
        Ok(lock(&self.containers).remove(name))
    }

    async fn run(&self, spec: &RunSpec, _cancel: &CancellationToken) -> Result<()> {
        self.record(format!("run {}", spec.name));
        if let Some(message) = &self.run_error {
            return Err(anyhow!("{message}"));
        }
        lock(&self.containers).insert(spec.name.clone());
        Ok(())
    }

    async fn follow_logs(&self, name: &str, cancel: &CancellationToken) -> Result<()> {
        self.record(format!("logs {name}"));
        if self.blocking_logs {
            cancel.cancelled().await;
        }
        Ok(())
    }
}

/// Source fetcher that writes a small artifact instead of cloning.
///
/// A successful clone writes `index.js` (the entry script), `.git/HEAD` and,
/// if requested, a `package.json` manifest. A scripted failure leaves a
/// partial directory behind and mentions the URL in its error.
#[derive(Debug)]
pub struct FakeFetcher {
    failures: Mutex<u32>,
    manifest: bool,
    entry_script: String,
    calls: Mutex<Vec<String>>,
}

impl Default for FakeFetcher {
    fn default() -> Self {
        Self {
            failures: Mutex::new(0),
            manifest: false,
            entry_script: "exit 0\n".to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failures(self, count: u32) -> Self {
        *lock(&self.failures) = count;
        self
    }

    pub fn with_manifest(mut self) -> Self {
        self.manifest = true;
        self
    }

    pub fn with_entry_script(mut self, script: &str) -> Self {
        self.entry_script = script.to_string();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl SourceFetcher for FakeFetcher {
    async fn clone_shallow(
        &self,
        url: &str,
        branch: &str,
        dest: &Path,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        lock(&self.calls).push(format!("clone {url} {branch}"));
        std::fs::create_dir_all(dest.join(".git")).context("create clone dir")?;
        if take_failure(&self.failures) {
            return Err(anyhow!(
                "git clone failed: fatal: unable to access '{url}': Could not resolve host"
            ));
        }
        std::fs::write(dest.join(".git").join("HEAD"), "ref: refs/heads/master\n")?;
        std::fs::write(dest.join("index.js"), &self.entry_script)?;
        if self.manifest {
            std::fs::write(dest.join("package.json"), "{}\n")?;
        }
        Ok(())
    }
}

/// Installer that records its working directories.
#[derive(Debug, Default)]
pub struct FakeInstaller {
    error: Option<String>,
    calls: Mutex<Vec<PathBuf>>,
}

impl FakeInstaller {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl DependencyInstaller for FakeInstaller {
    async fn install(&self, request: &InstallRequest, _cancel: &CancellationToken) -> Result<()> {
        lock(&self.calls).push(request.workdir.clone());
        match &self.error {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(()),
        }
    }
}

/// Temporary launcher root with tunables that keep probing inside it.
///
/// The host's own container markers are never consulted, retries do not
/// sleep, and entry files run under `sh`.
pub struct TestHost {
    dir: TempDir,
    pub tunables: Tunables,
}

impl TestHost {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create tempdir")?;
        let probe_dir = dir.path().join(".probe");
        std::fs::create_dir_all(&probe_dir).context("create probe dir")?;

        let mut tunables = Tunables::default();
        tunables.probe.marker_file = probe_dir.join("dockerenv");
        tunables.probe.init_cgroup_file = probe_dir.join("cgroup");
        tunables.retry.delay_secs = 0;
        tunables.artifact.interpreter = "sh".to_string();
        Ok(Self { dir, tunables })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn paths(&self) -> ArtifactPaths {
        self.tunables.paths(self.root())
    }

    pub fn context<'a>(&'a self, env: &'a EnvSnapshot) -> LoadContext<'a> {
        LoadContext::new(self.root(), env, &self.tunables)
    }

    /// Make the probe see the container runtime's marker file.
    pub fn mark_container(&self) -> Result<()> {
        std::fs::write(&self.tunables.probe.marker_file, "").context("write marker")
    }

    pub fn write_root_entry(&self, contents: &str) -> Result<()> {
        std::fs::write(self.paths().root_entry, contents).context("write root entry")
    }

    pub fn write_artifact_entry(&self, contents: &str) -> Result<()> {
        let paths = self.paths();
        std::fs::create_dir_all(&paths.artifact_dir).context("create artifact dir")?;
        std::fs::write(paths.artifact_entry, contents).context("write artifact entry")
    }

    /// Persist the tunables as `launcher.toml` so the binary picks them up.
    pub fn write_tunables_file(&self) -> Result<PathBuf> {
        let path = self.root().join(TUNABLES_FILE);
        let contents = toml::to_string(&self.tunables).context("serialize tunables")?;
        std::fs::write(&path, contents).context("write tunables")?;
        Ok(path)
    }
}
