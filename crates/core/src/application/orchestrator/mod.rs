// Orchestrator - process lifecycle for the worker fleet
//
// Loading -> Starting -> Running -> ShuttingDown -> Stopped

mod module;
mod shutdown;
mod stream;

pub use module::JobModule;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken, ShutdownTrigger};
pub use stream::{
    classify_stream_error, stream_error_channel, GuardedWriter, StreamAction, StreamErrorReceiver,
    StreamErrorSink, StreamFailure,
};

use crate::application::connection::ConnectionResolver;
use crate::application::handle::Worker;
use crate::application::registry::{Registry, StopReport};
use crate::domain::WorkerSelection;
use crate::error::AppError;
use crate::port::{EnvSource, Logger, ProcessEnv, TracingLogger};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Lifecycle state, observable through [`Orchestrator::subscribe_state`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Loading,
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorState::Loading => write!(f, "LOADING"),
            OrchestratorState::Starting => write!(f, "STARTING"),
            OrchestratorState::Running => write!(f, "RUNNING"),
            OrchestratorState::ShuttingDown => write!(f, "SHUTTING_DOWN"),
            OrchestratorState::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Errors that abort the orchestrator
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("connection setup failed: {0}")]
    Connection(#[source] AppError),

    #[error("module `{module}` failed to load: {source}")]
    ModuleLoad { module: String, source: AppError },

    #[error(
        "no registered worker matches --workers={}; available: {}",
        .requested.join(","),
        .available.join(",")
    )]
    EmptySelection {
        requested: Vec<String>,
        available: Vec<String>,
    },

    #[error("fatal write error on {}: {}", .0.stream, .0.message)]
    Stream(StreamFailure),

    #[error("orchestrator was already started")]
    AlreadyStarted,
}

/// Process exit status chosen by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failure,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failure => 1,
        }
    }
}

/// Result of a shutdown request
#[derive(Debug, Clone)]
pub enum ShutdownOutcome {
    Completed(StopReport),
    /// Another shutdown is running or already ran
    AlreadyInProgress,
    /// The bounded wait expired before teardown finished
    TimedOut,
}

#[derive(Debug, Clone)]
enum StartupPhase {
    Pending,
    Ready(Vec<Worker>),
    Failed,
}

/// Static inputs of one orchestrator run
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Connection snapshot from the config layer, overridden by env
    pub static_connection: Map<String, Value>,
    pub selection: WorkerSelection,
    /// Upper bound for the shutdown sequence; `None` waits indefinitely
    pub shutdown_timeout: Option<Duration>,
}

/// Owns start-up, worker activation and the single shutdown sweep
pub struct Orchestrator {
    registry: Arc<Registry>,
    resolver: ConnectionResolver,
    logger: Arc<dyn Logger>,
    config: OrchestratorConfig,
    modules: Mutex<Option<Vec<JobModule>>>,
    state: watch::Sender<OrchestratorState>,
    startup: watch::Sender<StartupPhase>,
    run_tasks: Mutex<Option<JoinSet<()>>>,
    shutting_down: AtomicBool,
}

impl Orchestrator {
    pub fn new(registry: Arc<Registry>, config: OrchestratorConfig) -> Self {
        let (state, _) = watch::channel(OrchestratorState::Loading);
        let (startup, _) = watch::channel(StartupPhase::Pending);
        Self {
            registry,
            resolver: ConnectionResolver::new(Arc::new(ProcessEnv)),
            logger: Arc::new(TracingLogger::default()),
            config,
            modules: Mutex::new(Some(Vec::new())),
            state,
            startup,
            run_tasks: Mutex::new(None),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_env(mut self, env: Arc<dyn EnvSource>) -> Self {
        self.resolver = ConnectionResolver::new(env);
        self
    }

    pub fn with_modules(self, modules: impl IntoIterator<Item = JobModule>) -> Self {
        if let Some(list) = self.lock_modules().as_mut() {
            list.extend(modules);
        }
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn state(&self) -> OrchestratorState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<OrchestratorState> {
        self.state.subscribe()
    }

    /// Drive the whole lifecycle and pick the exit status.
    ///
    /// Returns after the first of: a shutdown request on `shutdown`, a fatal
    /// stream error, or every started worker having returned on its own. A
    /// process that started no worker only stops on request.
    pub async fn run(
        self: Arc<Self>,
        mut shutdown: ShutdownToken,
        mut stream_errors: StreamErrorReceiver,
    ) -> ExitStatus {
        if let Err(e) = self.start().await {
            self.logger.error(&format!("failed to start workers: {}", e));
            // Queues registered before the failure still get closed
            self.shutdown().await;
            return ExitStatus::Failure;
        }

        let mut tasks = self
            .run_tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .unwrap_or_default();

        // With no worker running there is no end of life: stay up until asked to stop
        let end_of_life = async {
            if tasks.is_empty() {
                std::future::pending::<()>().await;
            }
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "Worker task ended abnormally");
                }
            }
            ShutdownTrigger::EndOfLife
        };
        let fatal_stream = async {
            match stream_errors.recv().await {
                Some(failure) => failure,
                None => std::future::pending().await,
            }
        };

        let status = tokio::select! {
            trigger = shutdown.wait() => {
                info!(trigger = %trigger, "Shutdown requested");
                ExitStatus::Success
            }
            failure = fatal_stream => {
                let error = OrchestratorError::Stream(failure);
                self.logger.error(&error.to_string());
                ExitStatus::Failure
            }
            trigger = end_of_life => {
                self.logger.info(&format!("all workers have stopped ({})", trigger));
                info!(trigger = %trigger, "Shutdown requested");
                ExitStatus::Success
            }
        };

        self.shutdown().await;
        status
    }

    /// Loading and Starting phases. Resolves once every selected worker was spawned.
    pub async fn start(&self) -> Result<Vec<Worker>, OrchestratorError> {
        let modules = self
            .lock_modules()
            .take()
            .ok_or(OrchestratorError::AlreadyStarted)?;

        let result = self.start_inner(modules).await;
        let phase = match &result {
            Ok(workers) => StartupPhase::Ready(workers.clone()),
            Err(_) => StartupPhase::Failed,
        };
        self.startup.send_replace(phase);
        result
    }

    async fn start_inner(&self, modules: Vec<JobModule>) -> Result<Vec<Worker>, OrchestratorError> {
        self.set_state(OrchestratorState::Loading);

        // The connection must be in place before any module registers a handle
        let connection = self
            .resolver
            .resolve(&self.config.static_connection)
            .map_err(OrchestratorError::Connection)?;
        self.registry.set_connection(connection.clone());
        info!(
            broker = self.registry.broker_name(),
            connection = %connection.redacted(),
            "Connection resolved"
        );

        for module in modules {
            let name = module.name().to_string();
            module
                .load(self.registry.clone())
                .await
                .map_err(|source| OrchestratorError::ModuleLoad {
                    module: name.clone(),
                    source,
                })?;
            debug!(module = %name, "Job module loaded");
        }

        self.set_state(OrchestratorState::Starting);

        let workers_to_run = match select_workers(&self.registry.workers(), &self.config.selection)
        {
            Ok(workers) => workers,
            Err(e) => {
                if let OrchestratorError::EmptySelection {
                    requested,
                    available,
                } = &e
                {
                    self.logger.error(&format!(
                        "no workers matched --workers={}",
                        requested.join(",")
                    ));
                    self.logger
                        .info(&format!("available workers:\n{}", bullet_list(available)));
                }
                return Err(e);
            }
        };

        if workers_to_run.is_empty() {
            self.logger.warn("no workers registered");
        }
        let names: Vec<String> = workers_to_run.iter().map(|w| w.name().to_string()).collect();
        self.logger
            .info(&format!("starting workers:\n{}", bullet_list(&names)));

        // Observers go on before any worker starts so no error goes unobserved
        for worker in &workers_to_run {
            let logger = self.logger.clone();
            let name = worker.name().to_string();
            worker.on_error(Arc::new(move |error| {
                logger.error(&format!("worker error [{}]: {}", name, error));
            }));
        }

        let mut tasks = JoinSet::new();
        for worker in &workers_to_run {
            let handle = worker.handle();
            let logger = self.logger.clone();
            let name = worker.name().to_string();
            tasks.spawn(async move {
                if let Err(e) = handle.run().await {
                    logger.error(&format!("worker run error [{}]: {}", name, e));
                }
            });
        }
        *self
            .run_tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(tasks);

        self.logger.success("workers started");
        self.set_state(OrchestratorState::Running);
        Ok(workers_to_run)
    }

    /// Idempotent shutdown: waits for start-up to settle, closes the selected
    /// workers, then every queue. Only the first call does any work.
    pub async fn shutdown(&self) -> ShutdownOutcome {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already in progress");
            return ShutdownOutcome::AlreadyInProgress;
        }

        self.logger.info("closing workers...");
        self.set_state(OrchestratorState::ShuttingDown);

        let sweep = async {
            let workers = self.await_startup().await;
            if !workers.is_empty() {
                let names: Vec<String> = workers.iter().map(|w| w.name().to_string()).collect();
                self.logger
                    .info(&format!("closing workers:\n{}", bullet_list(&names)));
            }
            self.registry.stop_selected(&workers).await
        };

        let outcome = match self.config.shutdown_timeout {
            Some(limit) => match tokio::time::timeout(limit, sweep).await {
                Ok(report) => ShutdownOutcome::Completed(report),
                Err(_) => {
                    self.logger.error(&format!(
                        "shutdown did not finish within {}s, exiting anyway",
                        limit.as_secs_f64()
                    ));
                    ShutdownOutcome::TimedOut
                }
            },
            None => ShutdownOutcome::Completed(sweep.await),
        };

        if let ShutdownOutcome::Completed(report) = &outcome {
            for failure in &report.failures {
                self.logger.error(&format!(
                    "failed to close {} {}: {}",
                    failure.kind, failure.name, failure.error
                ));
            }
            self.logger.success("workers closed");
        }

        self.set_state(OrchestratorState::Stopped);
        outcome
    }

    /// Workers started by `start`, or none if start-up failed
    async fn await_startup(&self) -> Vec<Worker> {
        let mut rx = self.startup.subscribe();
        let phase = match rx
            .wait_for(|phase| !matches!(phase, StartupPhase::Pending))
            .await
        {
            Ok(phase) => (*phase).clone(),
            Err(_) => StartupPhase::Failed,
        };
        match phase {
            StartupPhase::Ready(workers) => workers,
            _ => Vec::new(),
        }
    }

    fn set_state(&self, state: OrchestratorState) {
        debug!(state = %state, "Orchestrator state");
        self.state.send_replace(state);
    }

    fn lock_modules(&self) -> std::sync::MutexGuard<'_, Option<Vec<JobModule>>> {
        self.modules
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Registered workers allowed by `selection`, in registration order.
/// A named selection matching nothing is an error.
pub fn select_workers(
    registered: &[Worker],
    selection: &WorkerSelection,
) -> Result<Vec<Worker>, OrchestratorError> {
    let selected: Vec<Worker> = registered
        .iter()
        .filter(|w| selection.includes(w.name()))
        .cloned()
        .collect();

    if selected.is_empty() && !selection.is_all() {
        return Err(OrchestratorError::EmptySelection {
            requested: selection.names(),
            available: registered.iter().map(|w| w.name().to_string()).collect(),
        });
    }
    Ok(selected)
}

fn bullet_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!(" - {}", n))
        .collect::<Vec<_>>()
        .join("\n")
}
