//! Processor - worker process entry point
//!
//! Wires the broker adapter, job modules and signal handling into the orchestrator.

mod cli;
mod jobs;
mod logging;
mod settings;
mod signals;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use cli::{Args, BrokerKind};
use processor_core::application::{
    resolve_connection, shutdown_channel, stream_error_channel, ExitStatus, Orchestrator,
    OrchestratorConfig, Registry, StreamErrorReceiver,
};
use processor_core::domain::WorkerSelection;
use processor_core::port::{Broker, ProcessEnv};
use processor_infra_memory::InMemoryBroker;
use processor_infra_redis::{verify_connection, RedisBroker};
use settings::Settings;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // 1. Logging over guarded output streams
    let (stream_sink, stream_errors) = stream_error_channel();
    let _log_guards = match logging::init(args.log_format, stream_sink) {
        Ok(guards) => guards,
        Err(e) => {
            eprintln!("failed to initialize logging: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Processor v{} starting...", processor_core::VERSION);

    match run(args, stream_errors).await {
        Ok(status) => {
            info!(exit_code = status.code(), "Processor exiting");
            ExitCode::from(status.code())
        }
        Err(e) => {
            error!("failed to start workers: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, stream_errors: StreamErrorReceiver) -> Result<ExitStatus> {
    // 2. Signals first so a stop request during start-up is not lost
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let listener = signals::SignalListener::install().context("signal handler setup failed")?;
    tokio::spawn(listener.forward(shutdown_tx));

    // 3. Static configuration
    let settings = Settings::load(&args.config)?;

    // 4. Broker adapter and process-wide registry
    let broker: Arc<dyn Broker> = match args.broker {
        BrokerKind::Memory => Arc::new(InMemoryBroker::new()),
        BrokerKind::Redis => Arc::new(RedisBroker::new()),
    };
    info!(broker = broker.name(), "Broker selected");

    if args.broker == BrokerKind::Redis {
        let connection = resolve_connection(&settings.redis, &ProcessEnv)?;
        if connection.lazy_connect == Some(false) {
            verify_connection(&connection)
                .await
                .with_context(|| format!("cannot reach redis at {}", connection.redacted()))?;
        }
    }

    let registry = Registry::install(broker)?;

    // 5. Orchestrate until shutdown
    let config = OrchestratorConfig {
        static_connection: settings.redis.clone(),
        selection: WorkerSelection::from_flag(args.workers.as_deref()),
        shutdown_timeout: settings.shutdown_timeout(),
    };
    let orchestrator = Arc::new(Orchestrator::new(registry, config).with_modules(jobs::modules()));

    Ok(orchestrator.run(shutdown_rx, stream_errors).await)
}
