//! Source acquisition path: authenticated shallow clone plus dependency install.

use std::cell::RefCell;
use std::path::Path;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::core::config::DeploymentConfig;
use crate::core::mask::{Redactor, mask_token};
use crate::core::types::{AcquisitionOutcome, Strategy};
use crate::error::{AcquisitionStep, LaunchError};
use crate::io::config::{ArtifactPaths, Tunables};
use crate::io::git::{SourceFetcher, authenticated_url, remove_git_metadata};
use crate::io::install::{DependencyInstaller, InstallOutcome, InstallRequest, install_if_needed};
use crate::retry::retry;

/// Remove whatever occupies `dir`: a directory tree or a stray file.
/// Nothing there is fine.
async fn clear_dir(dir: &Path) -> std::io::Result<()> {
    let metadata = match tokio::fs::symlink_metadata(dir).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    if metadata.is_dir() {
        tokio::fs::remove_dir_all(dir).await
    } else {
        tokio::fs::remove_file(dir).await
    }
}

/// Run the source path to completion.
///
/// Clone failures after every attempt are fatal. Install failures are not:
/// the outcome is degraded and launching proceeds.
#[instrument(skip_all, fields(branch = %config.branch))]
pub async fn acquire_source(
    config: &DeploymentConfig,
    tunables: &Tunables,
    paths: &ArtifactPaths,
    fetcher: &dyn SourceFetcher,
    installer: &dyn DependencyInstaller,
    cancel: &CancellationToken,
) -> Result<AcquisitionOutcome> {
    let token = config
        .access_token
        .as_deref()
        .ok_or(LaunchError::MissingCredential)?;
    info!(token = %mask_token(token), branch = %config.branch, "source mode");

    let redactor = Redactor::new().with_secret(token);
    let url = authenticated_url(
        &tunables.source.host,
        &tunables.source.repository,
        token,
    );
    let dest = paths.artifact_dir.as_path();

    if let Err(err) = clear_dir(dest).await {
        warn!(dir = %dest.display(), error = %err, "could not clear previous artifact");
    }

    let policy = tunables.retry_policy();
    let last_error = RefCell::new(None);
    let (url, branch, failures) = (url.as_str(), config.branch.as_str(), &last_error);
    let cloned = retry(&policy, "cloning repository", &redactor, cancel, || async move {
        if let Err(err) = clear_dir(dest).await {
            warn!(dir = %dest.display(), error = %err, "could not clear partial clone");
        }
        let result = fetcher.clone_shallow(url, branch, dest, cancel).await;
        if let Err(err) = &result {
            *failures.borrow_mut() = Some(format!("{err:#}"));
        }
        result
    })
    .await;
    if cancel.is_cancelled() {
        return Err(LaunchError::Interrupted.into());
    }
    if !cloned {
        let reason = last_error
            .into_inner()
            .unwrap_or_else(|| "no attempt was made".to_string());
        return Err(LaunchError::AcquisitionFailed {
            step: AcquisitionStep::Clone,
            reason: redactor.redact(&reason),
        }
        .into());
    }
    info!(dir = %dest.display(), "repository cloned");

    match remove_git_metadata(dest).await {
        Ok(true) => info!("repository metadata removed"),
        Ok(false) => {}
        Err(err) => warn!(error = %format!("{err:#}"), "could not remove repository metadata"),
    }

    let manifest = dest.join(&tunables.source.manifest);
    let request = InstallRequest {
        workdir: dest.to_path_buf(),
        timeout: tunables.timeouts.install_timeout(),
    };
    info!("installing dependencies");
    match install_if_needed(&manifest, installer, &request, cancel).await {
        Ok(InstallOutcome::Installed) => {
            info!("dependencies installed");
            Ok(AcquisitionOutcome::ok(Strategy::Source))
        }
        Ok(InstallOutcome::Skipped) => {
            info!(manifest = %manifest.display(), "no dependency manifest; skipping install");
            Ok(AcquisitionOutcome::ok(Strategy::Source))
        }
        Ok(InstallOutcome::Failed(reason)) => {
            warn!(reason = %reason, "dependency install failed; launching anyway");
            Ok(AcquisitionOutcome::degraded(
                Strategy::Source,
                format!("dependency install failed: {reason}"),
            ))
        }
        Err(_) => Err(LaunchError::Interrupted.into()),
    }
}
