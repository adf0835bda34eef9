// Broker Port (Interface)
// Minimal capability surface of the underlying queue client. Adapters live in infra crates.

use crate::domain::{ConnectionConfig, Job, JobId, JobOptions, QueueOptions, WorkerOptions};
use async_trait::async_trait;
use std::future::Future;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Broker errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Command error: {0}")]
    Command(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("`{0}` is closed")]
    Closed(String),

    #[error("Job {job_id} failed: {reason}")]
    JobFailed { job_id: JobId, reason: String },

    #[error("Invalid option: {0}")]
    InvalidOption(String),
}

/// Failure reported by a job processor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ProcessorError(pub String);

impl ProcessorError {
    pub fn new(reason: impl std::fmt::Display) -> Self {
        Self(reason.to_string())
    }
}

impl From<String> for ProcessorError {
    fn from(reason: String) -> Self {
        Self(reason)
    }
}

impl From<&str> for ProcessorError {
    fn from(reason: &str) -> Self {
        Self(reason.to_string())
    }
}

/// User-supplied job processing function
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, job: Job) -> Result<serde_json::Value, ProcessorError>;
}

struct FnProcessor<F>(F);

#[async_trait]
impl<F, Fut> Processor for FnProcessor<F>
where
    F: Fn(Job) -> Fut + Send + Sync,
    Fut: Future<Output = Result<serde_json::Value, ProcessorError>> + Send,
{
    async fn process(&self, job: Job) -> Result<serde_json::Value, ProcessorError> {
        (self.0)(job).await
    }
}

/// Wrap an async closure as a [`Processor`]
pub fn processor_fn<F, Fut>(f: F) -> Arc<dyn Processor>
where
    F: Fn(Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value, ProcessorError>> + Send + 'static,
{
    Arc::new(FnProcessor(f))
}

/// Callback notified of worker errors
pub type ErrorObserver = Arc<dyn Fn(&BrokerError) + Send + Sync>;

/// Fan-out list of error observers shared by a worker and its consume loops
#[derive(Clone, Default)]
pub struct ErrorObservers {
    inner: Arc<Mutex<Vec<ErrorObserver>>>,
}

impl ErrorObservers {
    pub fn attach(&self, observer: ErrorObserver) {
        self.lock().push(observer);
    }

    /// Notify every observer. Returns how many were notified.
    pub fn emit(&self, error: &BrokerError) -> usize {
        // Snapshot so observers can attach further observers without deadlocking
        let observers: Vec<ErrorObserver> = self.lock().clone();
        for observer in &observers {
            observer(error);
        }
        observers.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ErrorObserver>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Everything an adapter needs to open a queue handle
#[derive(Debug, Clone)]
pub struct QueueSpec {
    pub name: String,
    pub connection: ConnectionConfig,
    pub options: QueueOptions,
}

/// Everything an adapter needs to open a worker handle
#[derive(Clone)]
pub struct WorkerSpec {
    pub name: String,
    pub connection: ConnectionConfig,
    pub processor: Arc<dyn Processor>,
    pub options: WorkerOptions,
}

/// Opens queue and worker handles. Opening is synchronous: adapters defer I/O to first use.
pub trait Broker: Send + Sync {
    /// Adapter name for logs
    fn name(&self) -> &str;

    fn open_queue(&self, spec: QueueSpec) -> Result<Arc<dyn QueueHandle>, BrokerError>;

    fn open_worker(&self, spec: WorkerSpec) -> Result<Arc<dyn WorkerHandle>, BrokerError>;
}

/// Work-submission handle
#[async_trait]
pub trait QueueHandle: Send + Sync {
    fn name(&self) -> &str;

    /// Submit a job. Returns its ID.
    async fn add(
        &self,
        job_name: &str,
        data: serde_json::Value,
        opts: Option<JobOptions>,
    ) -> Result<JobId, BrokerError>;

    async fn close(&self) -> Result<(), BrokerError>;
}

/// Consumer handle
#[async_trait]
pub trait WorkerHandle: Send + Sync {
    fn name(&self) -> &str;

    /// Attach an error observer. Must happen before `run` to see every error.
    fn on_error(&self, observer: ErrorObserver);

    /// Consume jobs until closed. Resolves when the worker stops.
    async fn run(&self) -> Result<(), BrokerError>;

    /// Stop consuming and wait for in-flight jobs
    async fn close(&self) -> Result<(), BrokerError>;

    fn is_running(&self) -> bool;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::watch;

    /// Ordered event log shared by a mock broker and every handle it opened
    #[derive(Clone, Default)]
    pub struct EventLog(Arc<Mutex<Vec<String>>>);

    impl EventLog {
        fn push(&self, event: String) {
            self.0.lock().unwrap().push(event);
        }

        pub fn events(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }

        /// Position of the first event equal to `event`
        pub fn position(&self, event: &str) -> Option<usize> {
            self.events().iter().position(|e| e == event)
        }
    }

    /// Mock broker recording every handle it opens
    #[derive(Default)]
    pub struct MockBroker {
        log: EventLog,
        queues: Mutex<Vec<Arc<MockQueue>>>,
        workers: Mutex<Vec<Arc<MockWorker>>>,
        fail_close: Mutex<HashSet<String>>,
        fail_run: Mutex<HashSet<String>>,
        fail_open: AtomicBool,
    }

    impl MockBroker {
        pub fn new() -> Self {
            Self::default()
        }

        /// Handles named `name` opened after this call fail to close
        pub fn fail_close_for(&self, name: impl Into<String>) {
            self.fail_close.lock().unwrap().insert(name.into());
        }

        /// Workers named `name` opened after this call fail in `run`
        pub fn fail_run_for(&self, name: impl Into<String>) {
            self.fail_run.lock().unwrap().insert(name.into());
        }

        pub fn fail_open(&self) {
            self.fail_open.store(true, Ordering::SeqCst);
        }

        pub fn log(&self) -> EventLog {
            self.log.clone()
        }

        pub fn queues(&self) -> Vec<Arc<MockQueue>> {
            self.queues.lock().unwrap().clone()
        }

        pub fn workers(&self) -> Vec<Arc<MockWorker>> {
            self.workers.lock().unwrap().clone()
        }

        pub fn worker(&self, name: &str) -> Option<Arc<MockWorker>> {
            self.workers().into_iter().find(|w| w.name == name)
        }

        pub fn queue(&self, name: &str) -> Option<Arc<MockQueue>> {
            self.queues().into_iter().find(|q| q.name == name)
        }

        fn check_open(&self) -> Result<(), BrokerError> {
            if self.fail_open.load(Ordering::SeqCst) {
                return Err(BrokerError::Connection("mock open failure".to_string()));
            }
            Ok(())
        }
    }

    impl Broker for MockBroker {
        fn name(&self) -> &str {
            "mock"
        }

        fn open_queue(&self, spec: QueueSpec) -> Result<Arc<dyn QueueHandle>, BrokerError> {
            self.check_open()?;
            let queue = Arc::new(MockQueue {
                fail_close: self.fail_close.lock().unwrap().contains(&spec.name),
                name: spec.name.clone(),
                spec,
                log: self.log.clone(),
                close_count: AtomicUsize::new(0),
                added: Mutex::new(Vec::new()),
            });
            self.queues.lock().unwrap().push(queue.clone());
            Ok(queue)
        }

        fn open_worker(&self, spec: WorkerSpec) -> Result<Arc<dyn WorkerHandle>, BrokerError> {
            self.check_open()?;
            let (closed, _) = watch::channel(false);
            let worker = Arc::new(MockWorker {
                fail_close: self.fail_close.lock().unwrap().contains(&spec.name),
                fail_run: self.fail_run.lock().unwrap().contains(&spec.name),
                name: spec.name.clone(),
                connection: spec.connection.clone(),
                options: spec.options.clone(),
                processor: spec.processor.clone(),
                log: self.log.clone(),
                observers: ErrorObservers::default(),
                run_count: AtomicUsize::new(0),
                close_count: AtomicUsize::new(0),
                running: AtomicBool::new(false),
                closed,
            });
            self.workers.lock().unwrap().push(worker.clone());
            Ok(worker)
        }
    }

    /// Mock queue counting closes
    pub struct MockQueue {
        pub name: String,
        pub spec: QueueSpec,
        log: EventLog,
        fail_close: bool,
        close_count: AtomicUsize,
        added: Mutex<Vec<(String, serde_json::Value)>>,
    }

    impl MockQueue {
        pub fn close_count(&self) -> usize {
            self.close_count.load(Ordering::SeqCst)
        }

        pub fn added(&self) -> Vec<(String, serde_json::Value)> {
            self.added.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueueHandle for MockQueue {
        fn name(&self) -> &str {
            &self.name
        }

        async fn add(
            &self,
            job_name: &str,
            data: serde_json::Value,
            _opts: Option<JobOptions>,
        ) -> Result<JobId, BrokerError> {
            let mut added = self.added.lock().unwrap();
            added.push((job_name.to_string(), data));
            Ok(format!("mock-{}", added.len()))
        }

        async fn close(&self) -> Result<(), BrokerError> {
            self.close_count.fetch_add(1, Ordering::SeqCst);
            self.log.push(format!("queue:{}:close", self.name));
            if self.fail_close {
                return Err(BrokerError::Command(format!("mock close failure: {}", self.name)));
            }
            Ok(())
        }
    }

    /// Mock worker whose `run` blocks until `close`
    pub struct MockWorker {
        pub name: String,
        pub connection: ConnectionConfig,
        pub options: WorkerOptions,
        pub processor: Arc<dyn Processor>,
        log: EventLog,
        observers: ErrorObservers,
        fail_close: bool,
        fail_run: bool,
        run_count: AtomicUsize,
        close_count: AtomicUsize,
        running: AtomicBool,
        closed: watch::Sender<bool>,
    }

    impl MockWorker {
        pub fn run_count(&self) -> usize {
            self.run_count.load(Ordering::SeqCst)
        }

        pub fn close_count(&self) -> usize {
            self.close_count.load(Ordering::SeqCst)
        }

        pub fn observer_count(&self) -> usize {
            self.observers.len()
        }

        /// Simulate the underlying client reporting an error
        pub fn emit_error(&self, error: BrokerError) -> usize {
            self.observers.emit(&error)
        }
    }

    #[async_trait]
    impl WorkerHandle for MockWorker {
        fn name(&self) -> &str {
            &self.name
        }

        fn on_error(&self, observer: ErrorObserver) {
            self.log.push(format!("worker:{}:on_error", self.name));
            self.observers.attach(observer);
        }

        async fn run(&self) -> Result<(), BrokerError> {
            self.run_count.fetch_add(1, Ordering::SeqCst);
            self.log.push(format!("worker:{}:run", self.name));
            if self.fail_run {
                let error = BrokerError::Connection(format!("mock run failure: {}", self.name));
                self.observers.emit(&error);
                return Err(error);
            }
            self.running.store(true, Ordering::SeqCst);
            let mut closed = self.closed.subscribe();
            let _ = closed.wait_for(|closed| *closed).await;
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&self) -> Result<(), BrokerError> {
            self.close_count.fetch_add(1, Ordering::SeqCst);
            self.log.push(format!("worker:{}:close", self.name));
            self.closed.send_replace(true);
            if self.fail_close {
                return Err(BrokerError::Command(format!("mock close failure: {}", self.name)));
            }
            Ok(())
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_processor_fn_wraps_closure() {
        let processor = processor_fn(|job: Job| async move { Ok(job.data) });
        let job = Job::new(
            "id-1",
            0,
            "q",
            "n",
            serde_json::json!({"a": 1}),
            JobOptions::default(),
        );

        let result = processor.process(job).await.unwrap();
        assert_eq!(result["a"], 1);
    }

    #[test]
    fn test_error_observers_fan_out() {
        let observers = ErrorObservers::default();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = hits.clone();
            observers.attach(Arc::new(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let notified = observers.emit(&BrokerError::Command("boom".to_string()));
        assert_eq!(notified, 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_error_observers_clone_shares_list() {
        let observers = ErrorObservers::default();
        let shared = observers.clone();
        shared.attach(Arc::new(|_| {}));
        assert_eq!(observers.len(), 1);
    }
}
