// Domain Layer - Pure data types

pub mod connection;
pub mod error;
pub mod job;
pub mod queue;
pub mod selection;

// Re-exports
pub use connection::ConnectionConfig;
pub use error::DomainError;
pub use job::{Job, JobId, JobOptions, JobOverrides};
pub use queue::{QueueOptions, WorkerOptions, DEFAULT_PREFIX};
pub use selection::WorkerSelection;
