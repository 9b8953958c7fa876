//! Operator interrupt handling.
//!
//! Ctrl-C (SIGINT) is turned into a one-shot shutdown request carried on a
//! [`tokio::sync::watch`] channel. The first interrupt flips the flag; later
//! ones are logged and ignored, so a second Ctrl-C during cleanup
//! neither kills the supervisor nor repeats any cleanup step.

use tokio::sync::watch;
use tracing::{info, warn};

/// Receiving side: resolves once shutdown has been requested
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Sending side: requests shutdown, idempotently
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Create a connected trigger and receiver
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    /// Request shutdown; returns true only for the first request
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|requested| {
            if *requested {
                false
            } else {
                *requested = true;
                true
            }
        })
    }
}

impl Shutdown {
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until shutdown is requested
    ///
    /// If every trigger is dropped without firing this never resolves.
    pub async fn requested(mut self) {
        if self.rx.wait_for(|requested| *requested).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Install the interrupt handler and return the shutdown receiver
///
/// The handler is registered before this returns, so an interrupt that
/// arrives during startup is not lost.
#[cfg(unix)]
pub fn listen_for_interrupts() -> std::io::Result<Shutdown> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let (trigger, shutdown) = channel();

    tokio::spawn(async move {
        while sigint.recv().await.is_some() {
            on_interrupt(&trigger);
        }
    });

    Ok(shutdown)
}

#[cfg(not(unix))]
pub fn listen_for_interrupts() -> std::io::Result<Shutdown> {
    let (trigger, shutdown) = channel();

    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt(&trigger);
        }
    });

    Ok(shutdown)
}

fn on_interrupt(trigger: &ShutdownTrigger) {
    if trigger.trigger() {
        info!("Interrupt received, shutting down");
    } else {
        warn!("Shutdown already in progress, ignoring repeated interrupt");
    }
}
