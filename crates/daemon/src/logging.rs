// Logging setup
// Events go through non-blocking writers over guarded stdout/stderr: a closed
// pipe is swallowed, any other write failure reaches the orchestrator.

use crate::cli::LogFormat;
use processor_core::application::{GuardedWriter, StreamErrorSink};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "processor=info";

/// Keeps the background writers alive; dropping it flushes pending lines
pub struct LogGuards {
    _stdout: WorkerGuard,
    _stderr: WorkerGuard,
}

pub fn init(format: LogFormat, sink: StreamErrorSink) -> anyhow::Result<LogGuards> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;

    let (stdout, stdout_guard) = tracing_appender::non_blocking(GuardedWriter::new(
        std::io::stdout(),
        "stdout",
        sink.clone(),
    ));
    let (stderr, stderr_guard) =
        tracing_appender::non_blocking(GuardedWriter::new(std::io::stderr(), "stderr", sink));

    // Warnings and errors to stderr, everything else to stdout
    let writer = stderr.with_max_level(Level::WARN).or_else(stdout);

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(writer))
                .try_init()?;
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(writer))
                .try_init()?;
        }
    }

    Ok(LogGuards {
        _stdout: stdout_guard,
        _stderr: stderr_guard,
    })
}
