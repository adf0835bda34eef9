// Registry - process-wide queue/worker bookkeeping
//
// Job modules register queues and workers as a side effect of loading, so the
// registry is reachable through a global accessor. Tests and embedders may also
// build private instances with `Registry::new`.

use super::handle::{Queue, Worker};
use crate::domain::{ConnectionConfig, QueueOptions, WorkerOptions, DEFAULT_PREFIX};
use crate::error::{AppError, Result};
use crate::port::{Broker, BrokerError, Processor, QueueSpec, WorkerSpec};
use futures::future::join_all;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();

#[derive(Default)]
struct RegistryState {
    connection: ConnectionConfig,
    queues: Vec<Queue>,
    workers: Vec<Worker>,
    closed: bool,
}

/// Which kind of handle failed to close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Worker,
    Queue,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleKind::Worker => write!(f, "worker"),
            HandleKind::Queue => write!(f, "queue"),
        }
    }
}

/// A close call that failed during teardown
#[derive(Debug, Clone)]
pub struct CloseFailure {
    pub kind: HandleKind,
    pub name: String,
    pub error: BrokerError,
}

/// Outcome of a teardown sweep. Failures never stop the sweep.
#[derive(Debug, Clone, Default)]
pub struct StopReport {
    pub workers_closed: usize,
    pub queues_closed: usize,
    pub failures: Vec<CloseFailure>,
}

impl StopReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Tracks the active connection and every queue/worker created against it
pub struct Registry {
    broker: Arc<dyn Broker>,
    default_prefix: String,
    state: RwLock<RegistryState>,
}

impl Registry {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            broker,
            default_prefix: DEFAULT_PREFIX.to_string(),
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Prefix applied when a definition does not set one
    pub fn with_default_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.default_prefix = prefix.into();
        self
    }

    /// Install the process-wide registry. Fails if one is already installed.
    pub fn install(broker: Arc<dyn Broker>) -> Result<Arc<Registry>> {
        let registry = Arc::new(Registry::new(broker));
        GLOBAL
            .set(registry.clone())
            .map_err(|_| AppError::RegistryAlreadyInstalled)?;
        info!(broker = registry.broker.name(), "Registry installed");
        Ok(registry)
    }

    /// The process-wide registry
    pub fn global() -> Result<Arc<Registry>> {
        GLOBAL.get().cloned().ok_or(AppError::RegistryNotInstalled)
    }

    pub fn broker_name(&self) -> &str {
        self.broker.name()
    }

    /// Store the connection used by every queue/worker created from now on
    pub fn set_connection(&self, connection: ConnectionConfig) {
        debug!(connection = %connection.redacted(), "Connection set");
        self.write().connection = connection;
    }

    pub fn connection(&self) -> ConnectionConfig {
        self.read().connection.clone()
    }

    /// Create a queue bound to the current connection and track it
    pub fn create_queue(&self, name: impl Into<String>, options: QueueOptions) -> Result<Queue> {
        let name = name.into();
        let mut options = options;
        if options.prefix.is_none() {
            options.prefix = Some(self.default_prefix.clone());
        }

        let mut state = self.write();
        if state.closed {
            return Err(AppError::RegistryClosed);
        }
        if state.queues.iter().any(|q| q.name() == name) {
            warn!(queue = %name, "Queue name registered more than once; handles are independent");
        }

        let connection = state.connection.clone();
        let handle = self.broker.open_queue(QueueSpec {
            name: name.clone(),
            connection: connection.clone(),
            options: options.clone(),
        })?;

        let queue = Queue::new(name, connection, options, handle);
        state.queues.push(queue.clone());
        debug!(queue = %queue.name(), total = state.queues.len(), "Queue registered");
        Ok(queue)
    }

    /// Create a worker bound to the current connection and track it.
    /// `autorun` is always forced off: consumption starts only when the orchestrator says so.
    pub fn create_worker(
        &self,
        name: impl Into<String>,
        processor: Arc<dyn Processor>,
        options: WorkerOptions,
    ) -> Result<Worker> {
        let name = name.into();
        let mut options = options;
        options.autorun = false;
        if options.prefix.is_none() {
            options.prefix = Some(self.default_prefix.clone());
        }

        let mut state = self.write();
        if state.closed {
            return Err(AppError::RegistryClosed);
        }
        if state.workers.iter().any(|w| w.name() == name) {
            warn!(worker = %name, "Worker name registered more than once; handles are independent");
        }

        let connection = state.connection.clone();
        let handle = self.broker.open_worker(WorkerSpec {
            name: name.clone(),
            connection: connection.clone(),
            processor,
            options: options.clone(),
        })?;

        let worker = Worker::new(name, connection, options, handle);
        state.workers.push(worker.clone());
        debug!(worker = %worker.name(), total = state.workers.len(), "Worker registered");
        Ok(worker)
    }

    /// Queues in registration order
    pub fn queues(&self) -> Vec<Queue> {
        self.read().queues.clone()
    }

    /// Workers in registration order
    pub fn workers(&self) -> Vec<Worker> {
        self.read().workers.clone()
    }

    pub fn worker_names(&self) -> Vec<String> {
        self.read()
            .workers
            .iter()
            .map(|w| w.name().to_string())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.read().closed
    }

    /// Close every worker, then every queue
    pub async fn stop_all(&self) -> StopReport {
        let workers = self.read().workers.clone();
        self.stop_selected(&workers).await
    }

    /// Close the given workers, then every tracked queue, and retire the registry.
    ///
    /// Workers not listed are left untouched. Each sweep runs its closes
    /// concurrently and waits for all outcomes before the next sweep starts.
    pub async fn stop_selected(&self, workers: &[Worker]) -> StopReport {
        let queues = {
            let mut state = self.write();
            state.closed = true;
            state.workers.clear();
            std::mem::take(&mut state.queues)
        };

        let mut report = StopReport::default();

        let outcomes = join_all(workers.iter().map(|w| w.close())).await;
        for (worker, outcome) in workers.iter().zip(outcomes) {
            match outcome {
                Ok(()) => report.workers_closed += 1,
                Err(error) => report.failures.push(CloseFailure {
                    kind: HandleKind::Worker,
                    name: worker.name().to_string(),
                    error,
                }),
            }
        }

        let outcomes = join_all(queues.iter().map(|q| q.close())).await;
        for (queue, outcome) in queues.iter().zip(outcomes) {
            match outcome {
                Ok(()) => report.queues_closed += 1,
                Err(error) => report.failures.push(CloseFailure {
                    kind: HandleKind::Queue,
                    name: queue.name().to_string(),
                    error,
                }),
            }
        }

        for failure in &report.failures {
            warn!(
                kind = %failure.kind,
                name = %failure.name,
                error = %failure.error,
                "Close failed during teardown"
            );
        }

        report
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::broker::mocks::MockBroker;
    use crate::port::processor_fn;
    use serde_json::json;

    fn noop() -> Arc<dyn Processor> {
        processor_fn(|_job| async { Ok(json!(null)) })
    }

    fn registry() -> (Arc<MockBroker>, Registry) {
        let broker = Arc::new(MockBroker::new());
        (broker.clone(), Registry::new(broker))
    }

    fn connection(host: &str) -> ConnectionConfig {
        ConnectionConfig {
            host: host.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_binds_current_connection_and_disables_autorun() {
        let (broker, registry) = registry();
        registry.set_connection(connection("10.0.0.1"));

        let queue = registry.create_queue("test-queue", QueueOptions::default()).unwrap();
        let worker = registry
            .create_worker(
                "test-queue",
                noop(),
                WorkerOptions {
                    concurrency: 3,
                    autorun: true,
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(queue.name(), "test-queue");
        assert_eq!(queue.connection().host, "10.0.0.1");
        assert_eq!(worker.connection().host, "10.0.0.1");
        assert!(!worker.options().autorun);
        assert_eq!(worker.options().concurrency, 3);

        let opened = broker.worker("test-queue").unwrap();
        assert!(!opened.options.autorun);
        assert_eq!(opened.connection.host, "10.0.0.1");
    }

    #[test]
    fn test_connection_change_does_not_affect_existing_handles() {
        let (_broker, registry) = registry();
        registry.set_connection(connection("first"));
        let early = registry.create_queue("a", QueueOptions::default()).unwrap();

        registry.set_connection(connection("second"));
        let late = registry.create_queue("b", QueueOptions::default()).unwrap();

        assert_eq!(early.connection().host, "first");
        assert_eq!(late.connection().host, "second");
        assert_eq!(registry.connection().host, "second");
    }

    #[test]
    fn test_caller_prefix_wins_over_default() {
        let (_broker, registry) = registry();
        let registry = registry.with_default_prefix("app");

        let defaulted = registry.create_queue("a", QueueOptions::default()).unwrap();
        let explicit = registry
            .create_queue(
                "b",
                QueueOptions {
                    prefix: Some("custom".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(defaulted.options().prefix.as_deref(), Some("app"));
        assert_eq!(explicit.options().prefix.as_deref(), Some("custom"));
    }

    #[test]
    fn test_accessors_preserve_registration_order_and_duplicates() {
        let (_broker, registry) = registry();
        let first = registry.create_queue("dup", QueueOptions::default()).unwrap();
        registry.create_queue("other", QueueOptions::default()).unwrap();
        let second = registry.create_queue("dup", QueueOptions::default()).unwrap();

        let names: Vec<String> = registry.queues().iter().map(|q| q.name().to_string()).collect();
        assert_eq!(names, vec!["dup", "other", "dup"]);
        assert!(!first.same_handle(&second));
    }

    #[tokio::test]
    async fn test_stop_all_closes_workers_before_queues() {
        let (broker, registry) = registry();
        registry.create_queue("q1", QueueOptions::default()).unwrap();
        registry.create_worker("w1", noop(), WorkerOptions::default()).unwrap();
        registry.create_worker("w2", noop(), WorkerOptions::default()).unwrap();

        let report = registry.stop_all().await;

        assert!(report.is_clean());
        assert_eq!(report.workers_closed, 2);
        assert_eq!(report.queues_closed, 1);

        let log = broker.log();
        let queue_close = log.position("queue:q1:close").unwrap();
        assert!(log.position("worker:w1:close").unwrap() < queue_close);
        assert!(log.position("worker:w2:close").unwrap() < queue_close);
    }

    #[tokio::test]
    async fn test_stop_all_isolates_close_failures() {
        let (broker, registry) = registry();
        broker.fail_close_for("w-bad");
        broker.fail_close_for("q-bad");

        registry.create_worker("w-bad", noop(), WorkerOptions::default()).unwrap();
        registry.create_worker("w-good", noop(), WorkerOptions::default()).unwrap();
        registry.create_queue("q-bad", QueueOptions::default()).unwrap();
        registry.create_queue("q-good", QueueOptions::default()).unwrap();

        let report = registry.stop_all().await;

        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.workers_closed, 1);
        assert_eq!(report.queues_closed, 1);
        for worker in broker.workers() {
            assert_eq!(worker.close_count(), 1, "worker {} not closed", worker.name);
        }
        for queue in broker.queues() {
            assert_eq!(queue.close_count(), 1, "queue {} not closed", queue.name);
        }
    }

    #[tokio::test]
    async fn test_closed_registry_rejects_new_handles() {
        let (_broker, registry) = registry();
        registry.stop_all().await;

        assert!(registry.is_closed());
        assert!(matches!(
            registry.create_queue("late", QueueOptions::default()),
            Err(AppError::RegistryClosed)
        ));
        assert!(matches!(
            registry.create_worker("late", noop(), WorkerOptions::default()),
            Err(AppError::RegistryClosed)
        ));
        assert!(registry.queues().is_empty());
    }

    #[test]
    fn test_broker_open_failure_is_not_tracked() {
        let (broker, registry) = registry();
        broker.fail_open();

        let result = registry.create_queue("q", QueueOptions::default());
        assert!(matches!(result, Err(AppError::Broker(_))));
        assert!(registry.queues().is_empty());
    }

    #[test]
    fn test_concurrent_registration_keeps_every_handle() {
        let (_broker, registry) = registry();
        let registry = Arc::new(registry);

        let threads: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry
                        .create_worker(format!("w{}", i), noop(), WorkerOptions::default())
                        .unwrap();
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(registry.workers().len(), 8);
    }
}
