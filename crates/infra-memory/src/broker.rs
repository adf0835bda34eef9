// In-Memory Broker
// Queues and workers opened on the same (prefix, name) pair share one job list.
// The connection settings are accepted and ignored.

use crate::queue::MemoryQueue;
use crate::store::JobList;
use crate::worker::MemoryWorker;
use processor_core::domain::DEFAULT_PREFIX;
use processor_core::port::id_provider::UuidProvider;
use processor_core::port::time_provider::SystemTimeProvider;
use processor_core::port::{
    Broker, BrokerError, IdProvider, QueueHandle, QueueSpec, TimeProvider, WorkerHandle,
    WorkerSpec,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub struct InMemoryBroker {
    lists: Mutex<HashMap<(String, String), Arc<JobList>>>,
    ids: Arc<dyn IdProvider>,
    clock: Arc<dyn TimeProvider>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            lists: Mutex::new(HashMap::new()),
            ids: Arc::new(UuidProvider),
            clock: Arc::new(SystemTimeProvider),
        }
    }

    pub fn with_id_provider(mut self, ids: Arc<dyn IdProvider>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_time_provider(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    /// Shared job list for `(prefix, name)`, created on first use
    pub fn list(&self, prefix: &str, name: &str) -> Arc<JobList> {
        let mut lists = self
            .lists
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        lists
            .entry((prefix.to_string(), name.to_string()))
            .or_insert_with(|| Arc::new(JobList::new(prefix, name)))
            .clone()
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker for InMemoryBroker {
    fn name(&self) -> &str {
        "memory"
    }

    fn open_queue(&self, spec: QueueSpec) -> Result<Arc<dyn QueueHandle>, BrokerError> {
        let prefix = spec.options.prefix.as_deref().unwrap_or(DEFAULT_PREFIX);
        let list = self.list(prefix, &spec.name);
        debug!(queue = %spec.name, key = %list.key(), "Opening in-memory queue");
        Ok(Arc::new(MemoryQueue::new(
            spec.name,
            list,
            self.ids.clone(),
            self.clock.clone(),
        )))
    }

    fn open_worker(&self, spec: WorkerSpec) -> Result<Arc<dyn WorkerHandle>, BrokerError> {
        if spec.options.concurrency == 0 {
            return Err(BrokerError::InvalidOption(
                "concurrency must be at least 1".to_string(),
            ));
        }
        let prefix = spec.options.prefix.as_deref().unwrap_or(DEFAULT_PREFIX);
        let list = self.list(prefix, &spec.name);
        debug!(worker = %spec.name, key = %list.key(), "Opening in-memory worker");
        Ok(Arc::new(MemoryWorker::new(
            spec.name,
            list,
            spec.processor,
            spec.options.concurrency,
        )))
    }
}
