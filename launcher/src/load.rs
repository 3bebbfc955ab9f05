//! The loader: probe the host, choose a strategy, acquire the artifact.

use std::path::Path;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::container::acquire_container;
use crate::core::config::{DeploymentConfig, EnvSnapshot};
use crate::core::platform::detect_platform;
use crate::core::probe::classify_host;
use crate::core::strategy::{ensure_runnable, select_strategy};
use crate::core::types::{AcquisitionOutcome, HostCapabilities, ProbeResult, Strategy};
use crate::io::config::{ArtifactPaths, Tunables};
use crate::io::engine::ContainerEngine;
use crate::io::git::SourceFetcher;
use crate::io::install::DependencyInstaller;
use crate::io::probe::observe_host;
use crate::source::acquire_source;

/// External capabilities the loader drives.
#[derive(Clone, Copy)]
pub struct Backends<'a> {
    pub engine: &'a dyn ContainerEngine,
    pub fetcher: &'a dyn SourceFetcher,
    pub installer: &'a dyn DependencyInstaller,
}

/// Inputs shared by the loader and the starter.
#[derive(Debug, Clone)]
pub struct LoadContext<'a> {
    pub env: &'a EnvSnapshot,
    pub tunables: &'a Tunables,
    pub paths: ArtifactPaths,
}

impl<'a> LoadContext<'a> {
    pub fn new(root: &Path, env: &'a EnvSnapshot, tunables: &'a Tunables) -> Self {
        Self {
            env,
            tunables,
            paths: tunables.paths(root),
        }
    }
}

/// Classify the host from its observations and the detected platform.
pub fn probe_host(ctx: &LoadContext<'_>) -> ProbeResult {
    let platform = detect_platform(ctx.env);
    match platform {
        Some(platform) => info!(%platform, "hosting platform detected"),
        None => info!("no known hosting platform detected"),
    }
    let observations = observe_host(&ctx.tunables.probe, &ctx.paths.root_entry);
    classify_host(
        &observations,
        &ctx.tunables.artifact.content_markers,
        platform,
    )
}

/// Run the loader to completion.
///
/// Configuration is only resolved when acquisition is needed, so a host that
/// already carries the artifact needs no deployment variables.
#[instrument(skip_all, fields(root = %ctx.paths.root.display()))]
pub async fn run_load(
    ctx: &LoadContext<'_>,
    backends: Backends<'_>,
    cancel: &CancellationToken,
) -> Result<AcquisitionOutcome> {
    let probe = probe_host(ctx);
    if let ProbeResult::ArtifactPresent(marker) = probe {
        info!(?marker, "artifact already present; nothing to acquire");
        return Ok(AcquisitionOutcome::ok(Strategy::AlreadyPresent));
    }

    let config = DeploymentConfig::resolve(ctx.env)?;
    let capabilities = HostCapabilities {
        container_engine: backends.engine.is_available().await,
    };
    let strategy = select_strategy(probe, config.use_container, capabilities);
    info!(
        %strategy,
        use_docker = ?config.use_container,
        engine = capabilities.container_engine,
        "strategy selected"
    );
    ensure_runnable(strategy, capabilities)?;

    let outcome = match strategy {
        Strategy::AlreadyPresent => AcquisitionOutcome::ok(Strategy::AlreadyPresent),
        Strategy::Container => {
            acquire_container(&config, ctx.tunables, backends.engine, cancel).await?
        }
        Strategy::Source => {
            acquire_source(
                &config,
                ctx.tunables,
                &ctx.paths,
                backends.fetcher,
                backends.installer,
                cancel,
            )
            .await?
        }
    };
    if let Some(message) = &outcome.message {
        warn!(%message, "acquisition completed with warnings");
    } else {
        info!(strategy = %outcome.strategy, "acquisition completed");
    }
    Ok(outcome)
}
