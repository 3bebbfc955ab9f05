//! Launcher tunables stored in an optional `launcher.toml` at the root.
//!
//! Identity and credentials come from the environment
//! ([`crate::core::config::DeploymentConfig`]). This file only holds policy
//! and resource names that operators rarely change.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

pub const TUNABLES_FILE: &str = "launcher.toml";

/// Launcher tunables (TOML). Missing fields take the defaults below.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Tunables {
    pub retry: RetryConfig,
    pub timeouts: TimeoutConfig,
    pub probe: ProbeConfig,
    pub container: ContainerConfig,
    pub source: SourceConfig,
    pub artifact: ArtifactConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts for image pull and repository clone, including the first.
    pub max_attempts: u32,
    /// Fixed pause between failed attempts.
    pub delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub pull_secs: u64,
    pub clone_secs: u64,
    pub install_secs: u64,
    /// Bound on local capability checks such as `docker --version`.
    pub probe_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            pull_secs: 5 * 60,
            clone_secs: 2 * 60,
            install_secs: 5 * 60,
            probe_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProbeConfig {
    /// Marker file the container runtime creates in every container.
    pub marker_file: PathBuf,
    /// Cgroup membership of PID 1.
    pub init_cgroup_file: PathBuf,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            marker_file: PathBuf::from("/.dockerenv"),
            init_cgroup_file: PathBuf::from("/proc/1/cgroup"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContainerConfig {
    /// Container engine CLI.
    pub engine: String,
    /// Default image reference; `DOCKER_IMAGE` overrides it.
    pub image: String,
    pub name: String,
    pub restart_policy: String,
    /// Named volume holding session state. Never removed by the launcher.
    pub volume: String,
    /// Mount point of `volume` inside the container.
    pub session_path: String,
}

const DEFAULT_IMAGE: &str =
    "mrwasi/wasimdv7@sha256:8df63829675926a5eab84237702623ef2365f82a3e3eb4060b883677f2db707e";

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            engine: "docker".to_string(),
            image: DEFAULT_IMAGE.to_string(),
            name: "wasi-md-v7-bot".to_string(),
            restart_policy: "unless-stopped".to_string(),
            volume: "wasi_session".to_string(),
            session_path: "/app/session".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourceConfig {
    pub host: String,
    /// `group/project` path on `host`.
    pub repository: String,
    /// Directory under the root that receives the clone.
    pub artifact_dir: PathBuf,
    /// Dependency manifest that triggers an install when present.
    pub manifest: String,
    /// Install command, run inside the artifact directory.
    pub install_command: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            host: "gitlab.com".to_string(),
            repository: "itxxwasi-group/WASI-MD-V7".to_string(),
            artifact_dir: PathBuf::from("core"),
            manifest: "package.json".to_string(),
            install_command: ["npm", "install", "--production", "--legacy-peer-deps"]
                .map(String::from)
                .to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ArtifactConfig {
    pub entry_file: String,
    /// Program that runs the entry file.
    pub interpreter: String,
    /// Strings that identify the real artifact in a root entry file.
    pub content_markers: Vec<String>,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            entry_file: "index.js".to_string(),
            interpreter: "node".to_string(),
            content_markers: ["WASI-MD", "baileys", "makeWASocket"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl TimeoutConfig {
    pub fn pull_timeout(&self) -> Duration {
        Duration::from_secs(self.pull_secs)
    }

    pub fn clone_timeout(&self) -> Duration {
        Duration::from_secs(self.clone_secs)
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }
}

impl Tunables {
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be > 0"));
        }
        for (name, secs) in [
            ("timeouts.pull_secs", self.timeouts.pull_secs),
            ("timeouts.clone_secs", self.timeouts.clone_secs),
            ("timeouts.install_secs", self.timeouts.install_secs),
            ("timeouts.probe_secs", self.timeouts.probe_secs),
        ] {
            if secs == 0 {
                return Err(anyhow!("{name} must be > 0"));
            }
        }
        let program = self.source.install_command.first();
        if program.is_none_or(|program| program.trim().is_empty()) {
            return Err(anyhow!("source.install_command must be a non-empty array"));
        }
        for (name, value) in [
            ("container.engine", &self.container.engine),
            ("container.name", &self.container.name),
            ("container.image", &self.container.image),
            ("container.volume", &self.container.volume),
            ("artifact.entry_file", &self.artifact.entry_file),
            ("artifact.interpreter", &self.artifact.interpreter),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{name} must not be empty"));
            }
        }
        if self.source.artifact_dir.as_os_str().is_empty() || self.source.artifact_dir.is_absolute()
        {
            return Err(anyhow!("source.artifact_dir must be a relative directory"));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            delay: Duration::from_secs(self.retry.delay_secs),
        }
    }

    pub fn paths(&self, root: &Path) -> ArtifactPaths {
        ArtifactPaths::new(root, &self.source.artifact_dir, &self.artifact.entry_file)
    }
}

/// Canonical artifact locations for a launcher root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub root: PathBuf,
    /// Entry file at the root, present when the artifact shipped with the launcher.
    pub root_entry: PathBuf,
    /// Directory the source path clones into.
    pub artifact_dir: PathBuf,
    pub artifact_entry: PathBuf,
}

impl ArtifactPaths {
    pub fn new(root: impl Into<PathBuf>, artifact_dir: &Path, entry_file: &str) -> Self {
        let root = root.into();
        let artifact_dir = root.join(artifact_dir);
        Self {
            root_entry: root.join(entry_file),
            artifact_entry: artifact_dir.join(entry_file),
            artifact_dir,
            root,
        }
    }
}

/// Load tunables from a TOML file.
///
/// If the file is missing, returns `Tunables::default()`.
pub fn load_tunables(path: &Path) -> Result<Tunables> {
    if !path.exists() {
        let cfg = Tunables::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: Tunables =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
