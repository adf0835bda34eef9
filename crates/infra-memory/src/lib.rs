// Processor Infrastructure - In-Memory Broker Adapter
// Implements: Broker, QueueHandle, WorkerHandle over process-local job lists

mod broker;
mod queue;
mod store;
mod worker;

pub use broker::InMemoryBroker;
pub use queue::MemoryQueue;
pub use store::{FailedJob, JobCounts, JobList};
pub use worker::MemoryWorker;

#[cfg(test)]
mod broker_test;
