// Config file loading
// The `[redis]` table becomes the static connection snapshot; env vars override it later.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub redis: Map<String, Value>,
    #[serde(default)]
    pub shutdown_timeout_secs: Option<u64>,
}

impl Settings {
    /// Load `path` (tilde-expanded). A missing file yields an empty snapshot.
    pub fn load(path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(path).into_owned();
        let source = config::Config::builder()
            .add_source(config::File::with_name(&expanded).required(false))
            .build()
            .with_context(|| format!("failed to read config file {}", expanded))?;
        source
            .try_deserialize()
            .with_context(|| format!("invalid config file {}", expanded))
    }

    pub fn shutdown_timeout(&self) -> Option<Duration> {
        self.shutdown_timeout_secs.map(Duration::from_secs)
    }
}
