// Signal handling
// Every termination signal maps onto the same shutdown request; repeats are logged and ignored.

use anyhow::Result;
use processor_core::application::{ShutdownSender, ShutdownTrigger};
use tracing::{info, warn};

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Installed signal streams. Created before any job module loads.
pub struct SignalListener {
    #[cfg(unix)]
    sigterm: Signal,
    #[cfg(unix)]
    sigint: Signal,
    #[cfg(unix)]
    sigquit: Signal,
}

impl SignalListener {
    #[cfg(unix)]
    pub fn install() -> Result<Self> {
        let listener = Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
            sigquit: signal(SignalKind::quit())?,
        };
        info!("Signal handler initialized, listening for SIGTERM, SIGINT and SIGQUIT");
        Ok(listener)
    }

    #[cfg(not(unix))]
    pub fn install() -> Result<Self> {
        info!("Signal handler initialized, listening for Ctrl+C");
        Ok(Self {})
    }

    /// Forward signals to `sender` until the process exits
    pub async fn forward(mut self, sender: ShutdownSender) {
        loop {
            let trigger = self.next().await;
            if sender.request(trigger) {
                info!(signal = %trigger, "Shutdown signal received");
            } else {
                warn!(signal = %trigger, "Shutdown already in progress, ignoring signal");
            }
        }
    }

    #[cfg(unix)]
    async fn next(&mut self) -> ShutdownTrigger {
        tokio::select! {
            _ = self.sigterm.recv() => ShutdownTrigger::Terminate,
            _ = self.sigint.recv() => ShutdownTrigger::Interrupt,
            _ = self.sigquit.recv() => ShutdownTrigger::Quit,
        }
    }

    #[cfg(not(unix))]
    async fn next(&mut self) -> ShutdownTrigger {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        ShutdownTrigger::Interrupt
    }
}
