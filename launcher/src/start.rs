//! The starter: make sure the artifact exists, then supervise it.

use anyhow::Result;
use tracing::info;

use crate::core::types::Strategy;
use crate::error::LaunchError;
use crate::exit_codes;
use crate::load::{Backends, LoadContext, run_load};
use crate::signals::Shutdown;
use crate::supervise::{SupervisedProcess, supervise};

/// Run the full launch sequence and return the process exit code.
///
/// The loader is skipped when the artifact directory already holds an entry
/// file. When the container path ran, the engine owns the artifact and the
/// launcher has nothing left to supervise.
pub async fn run_start(
    ctx: &LoadContext<'_>,
    backends: Backends<'_>,
    shutdown: &mut Shutdown,
) -> Result<i32> {
    if ctx.paths.artifact_entry.is_file() {
        info!(
            entry = %ctx.paths.artifact_entry.display(),
            "artifact already acquired; skipping loader"
        );
    } else {
        let outcome = run_load(ctx, backends, shutdown.token()).await?;
        if outcome.strategy == Strategy::Container {
            info!("artifact runs under the container engine; launcher done");
            return Ok(exit_codes::OK);
        }
    }
    if shutdown.token().is_cancelled() {
        return Err(LaunchError::Interrupted.into());
    }

    let process = SupervisedProcess::locate(&ctx.paths, &ctx.tunables.artifact.interpreter)?;
    info!(
        program = %process.program,
        entry = %process.entry.display(),
        "launching artifact"
    );
    supervise(&process, shutdown).await
}
