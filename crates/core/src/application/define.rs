// Definition Handlers
// Stable surface job modules are written against. Each call registers exactly one handle.

use super::handle::{Queue, Worker};
use super::registry::Registry;
use crate::domain::{QueueOptions, WorkerOptions};
use crate::error::Result;
use crate::port::Processor;
use std::sync::Arc;

/// Arguments for [`define_queue`]
#[derive(Debug, Clone, Default)]
pub struct DefineQueue {
    pub name: String,
    pub options: QueueOptions,
}

impl DefineQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: QueueOptions::default(),
        }
    }

    pub fn options(mut self, options: QueueOptions) -> Self {
        self.options = options;
        self
    }
}

/// Arguments for [`define_worker`]
#[derive(Clone)]
pub struct DefineWorker {
    pub name: String,
    pub processor: Arc<dyn Processor>,
    pub options: WorkerOptions,
}

impl DefineWorker {
    pub fn new(name: impl Into<String>, processor: Arc<dyn Processor>) -> Self {
        Self {
            name: name.into(),
            processor,
            options: WorkerOptions::default(),
        }
    }

    pub fn options(mut self, options: WorkerOptions) -> Self {
        self.options = options;
        self
    }
}

/// Register a queue in the process-wide registry
pub fn define_queue(args: DefineQueue) -> Result<Queue> {
    let registry = Registry::global()?;
    define_queue_in(&registry, args)
}

/// Register a worker in the process-wide registry
pub fn define_worker(args: DefineWorker) -> Result<Worker> {
    let registry = Registry::global()?;
    define_worker_in(&registry, args)
}

/// Register a queue in a specific registry
pub fn define_queue_in(registry: &Registry, args: DefineQueue) -> Result<Queue> {
    registry.create_queue(args.name, args.options)
}

/// Register a worker in a specific registry
pub fn define_worker_in(registry: &Registry, args: DefineWorker) -> Result<Worker> {
    registry.create_worker(args.name, args.processor, args.options)
}
