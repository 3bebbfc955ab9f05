//! Acquisition strategy selection.
//!
//! Selection is total: every combination of probe result, override and host
//! capability yields exactly one [`Strategy`]. Whether the chosen strategy
//! can actually run is a separate check, [`ensure_runnable`].

use crate::core::types::{HostCapabilities, Platform, ProbeResult, Strategy};
use crate::error::LaunchError;

/// Choose how to obtain the artifact.
///
/// - Artifact already present: no acquisition.
/// - `use_container == Some(true)`: container path, regardless of host.
/// - `use_container == Some(false)`: source path.
/// - No override: the container path when the host has a working engine or
///   runs on a container-capable platform, unless the platform turns
///   containers off by default (Heroku). A container-capable platform
///   without an engine still selects containers; [`ensure_runnable`] then
///   rejects it instead of falling back to source.
pub fn select_strategy(
    probe: ProbeResult,
    use_container: Option<bool>,
    capabilities: HostCapabilities,
) -> Strategy {
    if probe.artifact_present() {
        return Strategy::AlreadyPresent;
    }
    match use_container {
        Some(true) => Strategy::Container,
        Some(false) => Strategy::Source,
        None => {
            let platform = probe.platform();
            if platform.is_some_and(Platform::disables_container_default) {
                Strategy::Source
            } else if capabilities.container_engine
                || platform.is_some_and(Platform::supports_containers)
            {
                Strategy::Container
            } else {
                Strategy::Source
            }
        }
    }
}

/// Reject a container strategy on a host without a working engine.
///
/// This is fatal rather than a silent switch to the source path: an operator
/// who forced containers must learn that the host cannot run them.
pub fn ensure_runnable(
    strategy: Strategy,
    capabilities: HostCapabilities,
) -> Result<(), LaunchError> {
    if strategy == Strategy::Container && !capabilities.container_engine {
        return Err(LaunchError::MisconfiguredStrategy);
    }
    Ok(())
}
