// Queue and Worker Handles
// Registry-owned wrappers around adapter handles, carrying the connection snapshot taken at creation.

use crate::domain::{ConnectionConfig, JobId, JobOverrides, QueueOptions, WorkerOptions};
use crate::port::{BrokerError, ErrorObserver, QueueHandle, WorkerHandle};
use std::fmt;
use std::sync::Arc;

/// Named work-submission handle
#[derive(Clone)]
pub struct Queue {
    name: String,
    connection: ConnectionConfig,
    options: QueueOptions,
    handle: Arc<dyn QueueHandle>,
}

impl Queue {
    pub(crate) fn new(
        name: String,
        connection: ConnectionConfig,
        options: QueueOptions,
        handle: Arc<dyn QueueHandle>,
    ) -> Self {
        Self {
            name,
            connection,
            options,
            handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Connection this queue was bound to when created
    pub fn connection(&self) -> &ConnectionConfig {
        &self.connection
    }

    pub fn options(&self) -> &QueueOptions {
        &self.options
    }

    /// Submit a job using the queue's default job options
    pub async fn add(&self, job_name: &str, data: serde_json::Value) -> Result<JobId, BrokerError> {
        self.add_with(job_name, data, JobOverrides::default()).await
    }

    /// Submit a job; unset fields of `overrides` fall back to the queue defaults
    pub async fn add_with(
        &self,
        job_name: &str,
        data: serde_json::Value,
        overrides: JobOverrides,
    ) -> Result<JobId, BrokerError> {
        let opts = overrides.resolve(self.options.default_job_options.as_ref());
        self.handle.add(job_name, data, Some(opts)).await
    }

    pub async fn close(&self) -> Result<(), BrokerError> {
        self.handle.close().await
    }

    /// True when both values wrap the same adapter handle
    pub fn same_handle(&self, other: &Queue) -> bool {
        Arc::ptr_eq(&self.handle, &other.handle)
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.name)
            .field("connection", &self.connection.redacted())
            .field("options", &self.options)
            .finish()
    }
}

/// Named consumer bound to a processor. Never started by construction.
#[derive(Clone)]
pub struct Worker {
    name: String,
    connection: ConnectionConfig,
    options: WorkerOptions,
    handle: Arc<dyn WorkerHandle>,
}

impl Worker {
    pub(crate) fn new(
        name: String,
        connection: ConnectionConfig,
        options: WorkerOptions,
        handle: Arc<dyn WorkerHandle>,
    ) -> Self {
        Self {
            name,
            connection,
            options,
            handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &ConnectionConfig {
        &self.connection
    }

    pub fn options(&self) -> &WorkerOptions {
        &self.options
    }

    pub fn on_error(&self, observer: ErrorObserver) {
        self.handle.on_error(observer);
    }

    /// Consume until closed
    pub async fn run(&self) -> Result<(), BrokerError> {
        self.handle.run().await
    }

    pub async fn close(&self) -> Result<(), BrokerError> {
        self.handle.close().await
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// Owned adapter handle, for spawning the run loop
    pub fn handle(&self) -> Arc<dyn WorkerHandle> {
        self.handle.clone()
    }

    pub fn same_handle(&self, other: &Worker) -> bool {
        Arc::ptr_eq(&self.handle, &other.handle)
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("connection", &self.connection.redacted())
            .field("options", &self.options)
            .finish()
    }
}
