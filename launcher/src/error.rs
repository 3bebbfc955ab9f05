//! Fatal launcher errors and their remediation hints.
//!
//! Every variant ends the process with [`crate::exit_codes::FATAL`]. Warnings
//! (stale-state cleanup, dependency install) never become a `LaunchError`.

use std::fmt;
use std::path::PathBuf;

use crate::core::types::Platform;

/// Network-dependent acquisition step that can exhaust its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionStep {
    Pull,
    Launch,
    Clone,
}

impl fmt::Display for AcquisitionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionStep::Pull => f.write_str("image pull"),
            AcquisitionStep::Launch => f.write_str("container launch"),
            AcquisitionStep::Clone => f.write_str("repository clone"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("required environment variables missing: {}", .names.join(", "))]
    MissingRequiredConfig { names: Vec<&'static str> },

    #[error("{step} failed: {reason}")]
    AcquisitionFailed {
        step: AcquisitionStep,
        reason: String,
    },

    #[error("container mode selected but no container engine is available on this host")]
    MisconfiguredStrategy,

    #[error("GITLAB_TOKEN is not set; source mode needs a repository access token")]
    MissingCredential,

    #[error("entry point not found (searched: {})", display_paths(.searched))]
    EntryPointNotFound { searched: Vec<PathBuf> },

    #[error("failed to start {program}: {source}")]
    ChildSpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("interrupted by termination signal during acquisition; partial state may remain")]
    Interrupted,
}

const PULL_HINTS: &[&str] = &[
    "check network connectivity to the image registry",
    "the registry may require authentication",
    "the image may not exist or may have moved (DOCKER_IMAGE)",
];

const CLONE_HINTS: &[&str] = &[
    "GITLAB_TOKEN may be invalid or expired",
    "the token needs the read_repository scope",
    "check network connectivity and the BRANCH name",
];

const ENGINE_HINTS: &[&str] = &[
    "install a container engine: https://docs.docker.com/get-docker/",
    "or use source mode: USE_DOCKER=false with GITLAB_TOKEN set",
];

const TOKEN_HINTS: &[&str] = &[
    "create a token at https://gitlab.com/-/profile/personal_access_tokens",
    "grant it the read_repository scope",
];

const ENTRY_HINTS: &[&str] = &[
    "check the repository layout and the configured entry file",
    "a failed install can leave an empty artifact directory; remove it and retry",
];

const LAUNCH_HINT: &str = "inspect the engine error above; a stale container may hold the name";
const HEROKU_DYNO_HINT: &str = "standard Heroku dynos cannot run containers; set USE_DOCKER=false";
const HEROKU_STACK_HINT: &str =
    "the Heroku container stack runs the image itself; deploy it without USE_DOCKER";
const HEROKU_IMAGE_HINT: &str =
    "to deploy the prebuilt image instead: heroku stack:set container -a <app>";
const HEROKU_TOKEN_HINT: &str = "heroku config:set GITLAB_TOKEN=glpat-xxxxxxxxxxxx";
const CONTAINER_MODE_HINT: &str =
    "or use container mode: USE_DOCKER=true on a host with a container engine";

fn extend(lines: &mut Vec<String>, hints: &[&str]) {
    lines.extend(hints.iter().map(|hint| hint.to_string()));
}

impl LaunchError {
    /// Human-readable remediation lines, tailored to the detected platform.
    pub fn remediation(&self, platform: Option<Platform>) -> Vec<String> {
        let heroku = matches!(platform, Some(Platform::Heroku { .. }));
        let mut lines = Vec::new();
        match self {
            LaunchError::MissingRequiredConfig { names } => {
                for name in names {
                    lines.push(format!("set {name} ({})", describe_required(name)));
                }
                if heroku {
                    for name in names {
                        lines.push(format!("heroku config:set {name}=<value>"));
                    }
                }
            }
            LaunchError::AcquisitionFailed { step, .. } => match step {
                AcquisitionStep::Pull => extend(&mut lines, PULL_HINTS),
                AcquisitionStep::Launch => lines.push(LAUNCH_HINT.to_string()),
                AcquisitionStep::Clone => {
                    extend(&mut lines, CLONE_HINTS);
                    if heroku {
                        lines.push("verify with: heroku config:get GITLAB_TOKEN".to_string());
                    }
                }
            },
            LaunchError::MisconfiguredStrategy => {
                extend(&mut lines, ENGINE_HINTS);
                if let Some(Platform::Heroku { container_stack }) = platform {
                    let hint = if container_stack {
                        HEROKU_STACK_HINT
                    } else {
                        HEROKU_DYNO_HINT
                    };
                    lines.push(hint.to_string());
                }
            }
            LaunchError::MissingCredential => {
                if heroku {
                    lines.push(HEROKU_IMAGE_HINT.to_string());
                }
                extend(&mut lines, TOKEN_HINTS);
                if heroku {
                    lines.push(HEROKU_TOKEN_HINT.to_string());
                } else {
                    lines.push("export GITLAB_TOKEN=glpat-xxxxxxxxxxxx".to_string());
                }
                lines.push(CONTAINER_MODE_HINT.to_string());
            }
            LaunchError::EntryPointNotFound { .. } => extend(&mut lines, ENTRY_HINTS),
            LaunchError::ChildSpawnFailed { program, .. } => {
                lines.push(format!("make sure `{program}` is installed and on PATH"));
            }
            LaunchError::Interrupted => {}
        }
        lines
    }
}

fn describe_required(name: &str) -> &'static str {
    match name {
        "SESSION_ID" => "your session identifier",
        "OWNER_NUMBER" => "the owner's phone number",
        _ => "required",
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
