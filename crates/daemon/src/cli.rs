// Command-line arguments

use clap::{Parser, ValueEnum};

pub const DEFAULT_CONFIG_PATH: &str = "processor.toml";

#[derive(Parser, Debug)]
#[command(name = "processor")]
#[command(about = "Run the registered background job workers", long_about = None)]
#[command(version)]
pub struct Args {
    /// Comma-separated worker names to start (default: all registered workers)
    #[arg(long, env = "PROCESSOR_WORKERS", value_name = "NAMES")]
    pub workers: Option<String>,

    /// Config file holding the static connection snapshot
    #[arg(long, env = "PROCESSOR_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Broker adapter
    #[arg(long, env = "PROCESSOR_BROKER", value_enum, default_value_t = BrokerKind::Redis)]
    pub broker: BrokerKind,

    /// Log output format
    #[arg(long, env = "PROCESSOR_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BrokerKind {
    /// In-process lists (local development, tests)
    Memory,
    Redis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable, colored
    Pretty,
    /// One JSON object per line
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_err;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["processor"]).unwrap();
        assert_eq!(args.workers, None);
        assert_eq!(args.config, DEFAULT_CONFIG_PATH);
        assert_eq!(args.broker, BrokerKind::Redis);
    }

    #[test]
    fn test_workers_flag_with_equals() {
        let args = Args::try_parse_from(["processor", "--workers=hello,basic", "--broker", "memory"])
            .unwrap();
        assert_eq!(args.workers.as_deref(), Some("hello,basic"));
        assert_eq!(args.broker, BrokerKind::Memory);
    }

    #[test]
    fn test_unknown_broker_is_rejected() {
        assert_err!(Args::try_parse_from(["processor", "--broker", "kafka"]));
    }
}
