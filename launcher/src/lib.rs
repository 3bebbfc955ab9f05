//! Deployment launcher: acquire an application artifact, then supervise it.
//!
//! Given the host it runs on, the launcher either pulls a prebuilt container
//! image and hands it to the container engine, or clones a private source
//! repository and installs its dependencies. Once the artifact is present it
//! runs the entry point as a child process, relays termination signals to it,
//! and exits with the child's status.
//!
//! - **[`core`]**: Pure, deterministic decisions (probe classification,
//!   configuration resolution, strategy selection, secret masking).
//! - **[`io`]**: Side-effecting adapters (external commands, filesystem
//!   observation, container engine, git, dependency installer).
//!
//! Orchestration modules ([`load`], [`start`], [`container`], [`source`],
//! [`supervise`]) coordinate the two to implement the CLI entry sequences.

pub mod container;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod load;
pub mod logging;
pub mod retry;
pub mod signals;
pub mod source;
pub mod start;
pub mod supervise;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
