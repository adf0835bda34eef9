// Queue and Worker Options

use super::job::JobOptions;
use serde::{Deserialize, Serialize};

/// Key namespace used when no prefix is configured
pub const DEFAULT_PREFIX: &str = "bull";

/// Queue options supplied by job definitions (connection is never part of them)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_job_options: Option<JobOptions>,
}

/// Worker options supplied by job definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Number of jobs processed in parallel by one worker
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Start consuming on creation. The registry always turns this off.
    #[serde(default)]
    pub autorun: bool,
}

fn default_concurrency() -> usize {
    1
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            prefix: None,
            concurrency: default_concurrency(),
            autorun: false,
        }
    }
}
