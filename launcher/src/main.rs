//! Launcher CLI.
//!
//! Behavior is driven by the environment. The only arguments are an optional
//! subcommand; without one the launcher runs `start`.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use launcher::core::config::EnvSnapshot;
use launcher::core::platform::detect_platform;
use launcher::error::LaunchError;
use launcher::exit_codes;
use launcher::io::config::{TUNABLES_FILE, Tunables, load_tunables};
use launcher::io::engine::DockerCli;
use launcher::io::git::GitCli;
use launcher::io::install::CommandInstaller;
use launcher::load::{Backends, LoadContext, run_load};
use launcher::logging;
use launcher::signals::{shutdown_channel, spawn_signal_listener};
use launcher::start::run_start;

#[derive(Parser)]
#[command(
    name = "launcher",
    version,
    about = "Acquire the application artifact and supervise it"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Acquire the artifact if needed, then run and supervise it (default).
    Start,
    /// Acquire the artifact and exit.
    Load,
}

fn main() {
    let cli = Cli::parse();
    logging::init();
    let env = capture_env();
    let code = match run(cli.command.unwrap_or(Command::Start), &env) {
        Ok(code) => code,
        Err(err) => {
            report(&err, &env);
            exit_codes::FATAL
        }
    };
    std::process::exit(code);
}

fn capture_env() -> EnvSnapshot {
    EnvSnapshot::from_pairs(
        std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?))),
    )
}

fn run(command: Command, env: &EnvSnapshot) -> Result<i32> {
    let root = std::env::current_dir().context("resolve working directory")?;
    let tunables = load_tunables(&root.join(TUNABLES_FILE))?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build async runtime")?;
    runtime.block_on(execute(command, &root, env, &tunables))
}

async fn execute(
    command: Command,
    root: &Path,
    env: &EnvSnapshot,
    tunables: &Tunables,
) -> Result<i32> {
    let (trigger, mut shutdown) = shutdown_channel();
    spawn_signal_listener(trigger).context("install signal handlers")?;

    let engine = DockerCli::new(tunables);
    let fetcher = GitCli::new(tunables.timeouts.clone_timeout());
    let installer = CommandInstaller::new(tunables.source.install_command.clone());
    let backends = Backends {
        engine: &engine,
        fetcher: &fetcher,
        installer: &installer,
    };
    let ctx = LoadContext::new(root, env, tunables);

    match command {
        Command::Start => run_start(&ctx, backends, &mut shutdown).await,
        Command::Load => {
            run_load(&ctx, backends, shutdown.token()).await?;
            Ok(exit_codes::OK)
        }
    }
}

/// Print the error chain, then remediation hints for known failures.
fn report(err: &anyhow::Error, env: &EnvSnapshot) {
    eprintln!("{:#}", err);
    if let Some(launch) = err.downcast_ref::<LaunchError>() {
        let hints = launch.remediation(detect_platform(env));
        if !hints.is_empty() {
            eprintln!("to fix:");
            for hint in hints {
                eprintln!("  - {hint}");
            }
        }
    }
}
