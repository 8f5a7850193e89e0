//! Interrupt handling for the synchronous pipeline.
//!
//! A background thread runs a minimal tokio runtime that waits for SIGINT or
//! SIGTERM (Ctrl+C on non-Unix platforms) and raises a shared flag. The
//! orchestrator polls the flag between units of work. A second signal exits
//! the process immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::Result;

/// Exit status used when a second signal forces termination.
const FORCED_EXIT_CODE: i32 = 130;

/// Shared, clonable stop flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Spawn the listener thread that triggers `interrupt` on a termination signal.
pub fn install_handler(interrupt: Interrupt) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("signal-listener".into())
        .spawn(move || {
            runtime.block_on(async move {
                wait_for_signal().await;
                tracing::warn!("Interrupt received, stopping after the current request");
                interrupt.trigger();

                wait_for_signal().await;
                tracing::error!("Second interrupt received, exiting immediately");
                std::process::exit(FORCED_EXIT_CODE);
            });
        })?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    // Registration may fail in restricted environments (containers, tests).
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C, interrupts disabled");
            std::future::pending::<()>().await;
        }
    }
}
