//! Termination signals as explicit shutdown values.
//!
//! The OS handlers only feed a [`ShutdownTrigger`]. Everything else consumes
//! a [`Shutdown`]: acquisition steps watch its cancellation token, the
//! supervisor receives each signal kind so it can relay it to the child.

use std::fmt;

use nix::sys::signal::Signal;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Termination request received by the launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownKind {
    /// SIGINT: relay, then exit without waiting for the child.
    Interrupt,
    /// SIGTERM: relay, then wait for the child's own exit.
    Terminate,
}

impl ShutdownKind {
    pub fn signal(self) -> Signal {
        match self {
            ShutdownKind::Interrupt => Signal::SIGINT,
            ShutdownKind::Terminate => Signal::SIGTERM,
        }
    }
}

impl fmt::Display for ShutdownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.signal().as_str())
    }
}

/// Sending half. Cloneable; firing cancels the token and queues the kind.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: mpsc::UnboundedSender<ShutdownKind>,
    token: CancellationToken,
}

impl ShutdownTrigger {
    pub fn fire(&self, kind: ShutdownKind) {
        debug!(signal = %kind, "shutdown requested");
        let _ = self.tx.send(kind);
        self.token.cancel();
    }
}

/// Receiving half, owned by whoever drives the current phase.
#[derive(Debug)]
pub struct Shutdown {
    rx: mpsc::UnboundedReceiver<ShutdownKind>,
    token: CancellationToken,
}

impl Shutdown {
    /// Cancelled on the first signal; never reset.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Next signal, or `None` once every trigger is gone.
    pub async fn recv(&mut self) -> Option<ShutdownKind> {
        self.rx.recv().await
    }
}

pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = mpsc::unbounded_channel();
    let token = CancellationToken::new();
    (
        ShutdownTrigger {
            tx,
            token: token.clone(),
        },
        Shutdown { rx, token },
    )
}

/// Install SIGINT/SIGTERM handlers for the rest of the process's life and
/// forward every delivery to `trigger`.
pub fn spawn_signal_listener(trigger: ShutdownTrigger) -> std::io::Result<JoinHandle<()>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(tokio::spawn(async move {
        loop {
            let kind = tokio::select! {
                Some(()) = interrupt.recv() => ShutdownKind::Interrupt,
                Some(()) = terminate.recv() => ShutdownKind::Terminate,
                else => break,
            };
            trigger.fire(kind);
        }
    }))
}
