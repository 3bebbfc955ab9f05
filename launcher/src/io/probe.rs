//! Read-only host observation for the environment probe.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::core::probe::HostObservations;
use crate::io::config::ProbeConfig;

/// Gather the facts [`crate::core::probe::classify_host`] needs.
///
/// Unreadable files count as absent; probing never fails.
pub fn observe_host(probe: &ProbeConfig, root_entry: &Path) -> HostObservations {
    let observations = HostObservations {
        container_marker_file: probe.marker_file.exists(),
        init_cgroup: fs::read_to_string(&probe.init_cgroup_file).ok(),
        root_entry: fs::read_to_string(root_entry).ok(),
    };
    debug!(
        marker_file = observations.container_marker_file,
        cgroup_readable = observations.init_cgroup.is_some(),
        root_entry = observations.root_entry.is_some(),
        "host observed"
    );
    observations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_observe_nothing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let probe = ProbeConfig {
            marker_file: temp.path().join(".dockerenv"),
            init_cgroup_file: temp.path().join("cgroup"),
        };
        let obs = observe_host(&probe, &temp.path().join("index.js"));
        assert_eq!(obs, HostObservations::default());
    }

    #[test]
    fn reads_present_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let probe = ProbeConfig {
            marker_file: temp.path().join(".dockerenv"),
            init_cgroup_file: temp.path().join("cgroup"),
        };
        fs::write(&probe.marker_file, "").expect("marker");
        fs::write(&probe.init_cgroup_file, "0::/docker/abc\n").expect("cgroup");
        fs::write(temp.path().join("index.js"), "baileys").expect("entry");

        let obs = observe_host(&probe, &temp.path().join("index.js"));
        assert!(obs.container_marker_file);
        assert_eq!(obs.init_cgroup.as_deref(), Some("0::/docker/abc\n"));
        assert_eq!(obs.root_entry.as_deref(), Some("baileys"));
    }
}
