//! Shared deterministic types for launcher core logic.

use std::fmt;

/// Hosting platform recognized from its characteristic environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// `DYNO` is set. `container_stack` is true when `HEROKU_DOCKER=true`.
    Heroku { container_stack: bool },
    /// `RAILWAY_ENVIRONMENT` is set.
    Railway,
    /// `RENDER` is set.
    Render,
}

impl Platform {
    /// Whether the platform is known to run container images.
    pub fn supports_containers(self) -> bool {
        match self {
            Platform::Heroku { container_stack } => container_stack,
            Platform::Railway | Platform::Render => true,
        }
    }

    /// Heroku turns the container path off unless `USE_DOCKER=true` asks for
    /// it, even on the container stack.
    pub fn disables_container_default(self) -> bool {
        matches!(self, Platform::Heroku { .. })
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Heroku { .. } => f.write_str("Heroku"),
            Platform::Railway => f.write_str("Railway"),
            Platform::Render => f.write_str("Render"),
        }
    }
}

/// Evidence that the artifact is already on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceMarker {
    /// The container runtime's marker file exists.
    ContainerMarkerFile,
    /// PID 1's cgroup names a container runtime.
    ContainerCgroup,
    /// The root entry file exists and carries a recognized content marker.
    EntryFile,
}

/// Result of probing the execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    ArtifactPresent(PresenceMarker),
    PlatformHint(Platform),
    BareHost,
}

impl ProbeResult {
    pub fn artifact_present(&self) -> bool {
        matches!(self, ProbeResult::ArtifactPresent(_))
    }

    pub fn platform(&self) -> Option<Platform> {
        match self {
            ProbeResult::PlatformHint(platform) => Some(*platform),
            _ => None,
        }
    }
}

/// What the host can do, checked before a strategy is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostCapabilities {
    /// The container engine binary answered a version query.
    pub container_engine: bool,
}

/// Acquisition decision. Exactly one per loader invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The artifact is already present; no acquisition runs.
    AlreadyPresent,
    /// Pull the image and hand it to the container engine.
    Container,
    /// Clone the private repository and install its dependencies.
    Source,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::AlreadyPresent => f.write_str("already-present"),
            Strategy::Container => f.write_str("container"),
            Strategy::Source => f.write_str("source"),
        }
    }
}

/// Result of a completed acquisition.
///
/// Only successful acquisitions produce an outcome; fatal failures travel as
/// [`crate::error::LaunchError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionOutcome {
    pub strategy: Strategy,
    /// Non-fatal diagnostic, e.g. a dependency install that reported errors.
    pub message: Option<String>,
}

impl AcquisitionOutcome {
    pub fn ok(strategy: Strategy) -> Self {
        Self {
            strategy,
            message: None,
        }
    }

    pub fn degraded(strategy: Strategy, message: impl Into<String>) -> Self {
        Self {
            strategy,
            message: Some(message.into()),
        }
    }
}
