//! Container acquisition path: pull, clean up, launch, attach.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::core::config::DeploymentConfig;
use crate::core::mask::Redactor;
use crate::core::types::{AcquisitionOutcome, Strategy};
use crate::error::{AcquisitionStep, LaunchError};
use crate::io::config::Tunables;
use crate::io::engine::{ContainerEngine, RunSpec};
use crate::retry::retry;

/// Build the launch spec from the resolved configuration.
pub fn run_spec(config: &DeploymentConfig, tunables: &Tunables) -> RunSpec {
    let container = &tunables.container;
    RunSpec {
        name: container.name.clone(),
        image: config.image(&container.image).to_string(),
        restart_policy: container.restart_policy.clone(),
        env: config
            .forwarded_env()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        volume: container.volume.clone(),
        mount_path: container.session_path.clone(),
    }
}

/// Stop and remove any previous instance. Best-effort: failures are logged.
///
/// Returns true if an instance was removed.
pub async fn cleanup_container(engine: &dyn ContainerEngine, name: &str) -> bool {
    info!(container = name, "cleaning up existing container");
    match engine.remove(name).await {
        Ok(true) => {
            info!(container = name, "old container removed");
            true
        }
        Ok(false) => false,
        Err(err) => {
            warn!(container = name, error = %format!("{err:#}"), "could not remove old container");
            false
        }
    }
}

/// Run the container path to completion.
///
/// Returns after the log attachment ends, either because the follower exited
/// or because `cancel` fired. The container keeps running in both cases;
/// restarting it is the engine's job. The session volume is never removed.
#[instrument(skip_all, fields(container = %tunables.container.name))]
pub async fn acquire_container(
    config: &DeploymentConfig,
    tunables: &Tunables,
    engine: &dyn ContainerEngine,
    cancel: &CancellationToken,
) -> Result<AcquisitionOutcome> {
    let spec = run_spec(config, tunables);
    let policy = tunables.retry_policy();
    info!(image = %spec.image, "container mode");

    let pulled = retry(&policy, "pulling image", &Redactor::new(), cancel, || {
        engine.pull(&spec.image, cancel)
    })
    .await;
    if cancel.is_cancelled() {
        return Err(LaunchError::Interrupted.into());
    }
    if !pulled {
        return Err(LaunchError::AcquisitionFailed {
            step: AcquisitionStep::Pull,
            reason: format!(
                "could not pull {} after {} attempts",
                spec.image, policy.max_attempts
            ),
        }
        .into());
    }
    info!(image = %spec.image, "image pulled");

    cleanup_container(engine, &spec.name).await;

    info!(container = %spec.name, "starting container");
    if let Err(err) = engine.run(&spec, cancel).await {
        if cancel.is_cancelled() {
            return Err(LaunchError::Interrupted.into());
        }
        return Err(LaunchError::AcquisitionFailed {
            step: AcquisitionStep::Launch,
            reason: format!("{err:#}"),
        }
        .into());
    }
    info!(container = %spec.name, "container started; attaching to logs");

    if let Err(err) = engine.follow_logs(&spec.name, cancel).await {
        warn!(error = %format!("{err:#}"), "log attachment failed; container keeps running");
    }
    if cancel.is_cancelled() {
        info!("detached from container logs");
    }
    Ok(AcquisitionOutcome::ok(Strategy::Container))
}
