//! Cooperative cancellation for labeling jobs
//!
//! A [`ShutdownCoordinator`] is shared by the signal listener, the CLI and the
//! engine. Once stop is requested the engine stops dispatching, drops in-flight
//! classifications, checkpoints and terminates as cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, warn};

/// Cloneable stop flag with async notification
#[derive(Clone, Default)]
pub struct ShutdownCoordinator {
    requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("requested", &self.is_shutdown_requested())
            .finish()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder to stop; later calls are no-ops
    pub fn request_shutdown(&self) {
        if self.requested.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Stop requested, finishing with a checkpoint");
        self.notify.notify_waiters();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolve once stop has been requested, immediately if it already was
    pub async fn wait_for_shutdown(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if !self.is_shutdown_requested() {
            notified.await;
        }
    }

    /// Turn the first SIGINT or SIGTERM (Ctrl+C elsewhere) into a stop request
    ///
    /// The returned handle can be aborted once the job is over.
    pub fn install_signal_handlers(&self) -> tokio::task::JoinHandle<()> {
        let coordinator = self.clone();

        tokio::spawn(async move {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};

                let mut interrupt = match signal(SignalKind::interrupt()) {
                    Ok(stream) => stream,
                    Err(e) => {
                        warn!(error = %e, "Cannot listen for SIGINT");
                        return;
                    }
                };
                let mut terminate = match signal(SignalKind::terminate()) {
                    Ok(stream) => stream,
                    Err(e) => {
                        warn!(error = %e, "Cannot listen for SIGTERM");
                        return;
                    }
                };

                let name = tokio::select! {
                    _ = interrupt.recv() => "SIGINT",
                    _ = terminate.recv() => "SIGTERM",
                };
                warn!(signal = name, "Interrupted");
                coordinator.request_shutdown();
            }

            #[cfg(not(unix))]
            {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        warn!(signal = "ctrl-c", "Interrupted");
                        coordinator.request_shutdown();
                    }
                    Err(e) => warn!(error = %e, "Cannot listen for Ctrl+C"),
                }
            }
        })
    }
}
