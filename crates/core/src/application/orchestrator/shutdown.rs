// Shutdown Channel
// Every trigger source requests through one sender; only the first request counts.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// What asked the process to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// SIGINT - Ctrl+C
    Interrupt,
    /// SIGTERM - service manager stop
    Terminate,
    /// SIGQUIT
    Quit,
    /// Every started worker returned on its own
    EndOfLife,
    /// Requested programmatically
    Manual,
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownTrigger::Interrupt => write!(f, "SIGINT"),
            ShutdownTrigger::Terminate => write!(f, "SIGTERM"),
            ShutdownTrigger::Quit => write!(f, "SIGQUIT"),
            ShutdownTrigger::EndOfLife => write!(f, "END_OF_LIFE"),
            ShutdownTrigger::Manual => write!(f, "MANUAL"),
        }
    }
}

/// Receiving side, held by the orchestrator
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<Option<ShutdownTrigger>>,
}

impl ShutdownToken {
    /// Check if shutdown was requested
    pub fn is_requested(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// First trigger received, if any
    pub fn trigger(&self) -> Option<ShutdownTrigger> {
        *self.rx.borrow()
    }

    /// Wait for the first shutdown request. Resolves with `Manual` if every sender is gone.
    pub async fn wait(&mut self) -> ShutdownTrigger {
        match self.rx.wait_for(Option::is_some).await {
            Ok(trigger) => (*trigger).unwrap_or(ShutdownTrigger::Manual),
            Err(_) => ShutdownTrigger::Manual,
        }
    }
}

/// Requesting side, cloned into every signal listener
#[derive(Clone)]
pub struct ShutdownSender {
    tx: Arc<watch::Sender<Option<ShutdownTrigger>>>,
}

impl ShutdownSender {
    /// Request shutdown. Returns false when a request was already made.
    pub fn request(&self, trigger: ShutdownTrigger) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(trigger);
            true
        })
    }

    pub fn is_requested(&self) -> bool {
        self.tx.borrow().is_some()
    }
}

/// Create a shutdown channel
pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(None);
    (ShutdownSender { tx: Arc::new(tx) }, ShutdownToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_request_wins() {
        let (sender, token) = shutdown_channel();

        assert!(sender.request(ShutdownTrigger::Interrupt));
        assert!(!sender.request(ShutdownTrigger::Terminate));
        assert_eq!(token.trigger(), Some(ShutdownTrigger::Interrupt));
    }

    #[tokio::test]
    async fn test_wait_resolves_after_request() {
        let (sender, mut token) = shutdown_channel();
        let other = sender.clone();

        let waiter = tokio::spawn(async move { token.wait().await });
        other.request(ShutdownTrigger::Quit);

        assert_eq!(waiter.await.unwrap(), ShutdownTrigger::Quit);
        assert!(sender.is_requested());
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_already_requested() {
        let (sender, mut token) = shutdown_channel();
        sender.request(ShutdownTrigger::Terminate);

        assert_eq!(token.wait().await, ShutdownTrigger::Terminate);
    }

    #[test]
    fn test_trigger_display_uses_signal_names() {
        assert_eq!(ShutdownTrigger::Interrupt.to_string(), "SIGINT");
        assert_eq!(ShutdownTrigger::Quit.to_string(), "SIGQUIT");
    }
}
