// Job Domain Model

use serde::{Deserialize, Serialize};

/// Job ID (UUID v4)
pub type JobId = String;

/// Per-job options forwarded to the broker adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOptions {
    /// Total number of tries, including the first one
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    /// Delay before the job becomes available (ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(default)]
    pub remove_on_complete: bool,
}

fn default_attempts() -> u32 {
    1
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            priority: None,
            delay: None,
            remove_on_complete: false,
        }
    }
}

/// Per-call overrides for [`JobOptions`]. Fields left `None` fall back to the
/// queue's default job options, then to the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_on_complete: Option<bool>,
}

impl JobOverrides {
    /// Layer these overrides on top of `defaults`. Every field set here wins.
    pub fn resolve(self, defaults: Option<&JobOptions>) -> JobOptions {
        let base = defaults.cloned().unwrap_or_default();
        JobOptions {
            attempts: self.attempts.unwrap_or(base.attempts),
            priority: self.priority.or(base.priority),
            delay: self.delay.or(base.delay),
            remove_on_complete: self.remove_on_complete.unwrap_or(base.remove_on_complete),
        }
    }
}

/// A unit of work as seen by a processor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub queue: String,
    pub data: serde_json::Value,
    pub opts: JobOptions,
    pub attempts_made: u32,
    /// Creation time (epoch ms)
    pub timestamp: i64,
}

impl Job {
    /// Create a new job with injected ID and timestamp
    pub fn new(
        id: impl Into<String>,
        timestamp: i64,
        queue: impl Into<String>,
        name: impl Into<String>,
        data: serde_json::Value,
        opts: JobOptions,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            queue: queue.into(),
            data,
            opts,
            attempts_made: 0,
            timestamp,
        }
    }

    /// Record a failed try. Returns true when another try is allowed.
    pub fn record_failure(&mut self) -> bool {
        self.attempts_made += 1;
        self.attempts_made < self.opts.attempts
    }
}
