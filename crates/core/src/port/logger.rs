// Logger Port
// The orchestrator only needs four severities; the default forwards to `tracing`.

use tracing::{error, info, warn};

/// Severity-based output capability used for operator-facing messages
pub trait Logger: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
    fn success(&self, message: &str);
}

/// Logger backed by `tracing` events, tagged with a component name
pub struct TracingLogger {
    tag: &'static str,
}

impl TracingLogger {
    pub fn new(tag: &'static str) -> Self {
        Self { tag }
    }
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new("processor")
    }
}

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        info!(tag = self.tag, "{}", message);
    }

    fn warn(&self, message: &str) {
        warn!(tag = self.tag, "{}", message);
    }

    fn error(&self, message: &str) {
        error!(tag = self.tag, "{}", message);
    }

    fn success(&self, message: &str) {
        info!(tag = self.tag, outcome = "success", "{}", message);
    }
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Severity {
        Info,
        Warn,
        Error,
        Success,
    }

    /// Logger capturing every message for assertions
    #[derive(Default)]
    pub struct RecordingLogger {
        lines: Mutex<Vec<(Severity, String)>>,
    }

    impl RecordingLogger {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn lines(&self) -> Vec<(Severity, String)> {
            self.lines.lock().unwrap().clone()
        }

        /// True if some message of `severity` contains `needle`
        pub fn contains(&self, severity: Severity, needle: &str) -> bool {
            self.lines()
                .iter()
                .any(|(s, line)| *s == severity && line.contains(needle))
        }

        pub fn count(&self, severity: Severity, needle: &str) -> usize {
            self.lines()
                .iter()
                .filter(|(s, line)| *s == severity && line.contains(needle))
                .count()
        }

        fn push(&self, severity: Severity, message: &str) {
            self.lines.lock().unwrap().push((severity, message.to_string()));
        }
    }

    impl Logger for RecordingLogger {
        fn info(&self, message: &str) {
            self.push(Severity::Info, message);
        }

        fn warn(&self, message: &str) {
            self.push(Severity::Warn, message);
        }

        fn error(&self, message: &str) {
            self.push(Severity::Error, message);
        }

        fn success(&self, message: &str) {
            self.push(Severity::Success, message);
        }
    }
}
