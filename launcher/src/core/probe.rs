//! Deterministic classification of host observations.

use crate::core::types::{Platform, PresenceMarker, ProbeResult};

/// Raw facts gathered from the host by [`crate::io::probe::observe_host`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostObservations {
    /// The container runtime's marker file (`/.dockerenv`) exists.
    pub container_marker_file: bool,
    /// Contents of PID 1's cgroup file, if readable.
    pub init_cgroup: Option<String>,
    /// Contents of the entry file at the launcher root, if present.
    pub root_entry: Option<String>,
}

const CGROUP_RUNTIMES: [&str; 2] = ["docker", "containerd"];

/// Classify the host.
///
/// The artifact counts as present when the process runs inside a container,
/// or when the root entry file carries one of `content_markers`. A bare
/// placeholder entry file does not count.
pub fn classify_host(
    observations: &HostObservations,
    content_markers: &[String],
    platform: Option<Platform>,
) -> ProbeResult {
    if observations.container_marker_file {
        return ProbeResult::ArtifactPresent(PresenceMarker::ContainerMarkerFile);
    }
    if let Some(cgroup) = &observations.init_cgroup
        && CGROUP_RUNTIMES.iter().any(|rt| cgroup.contains(rt))
    {
        return ProbeResult::ArtifactPresent(PresenceMarker::ContainerCgroup);
    }
    if let Some(contents) = &observations.root_entry
        && has_content_marker(contents, content_markers)
    {
        return ProbeResult::ArtifactPresent(PresenceMarker::EntryFile);
    }
    match platform {
        Some(platform) => ProbeResult::PlatformHint(platform),
        None => ProbeResult::BareHost,
    }
}

fn has_content_marker(contents: &str, markers: &[String]) -> bool {
    markers
        .iter()
        .filter(|marker| !marker.is_empty())
        .any(|marker| contents.contains(marker.as_str()))
}
