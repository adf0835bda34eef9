// Port Layer - Interfaces for external dependencies

pub mod broker;
pub mod env_source;
pub mod id_provider; // For deterministic testing
pub mod logger;
pub mod time_provider;

// Re-exports
pub use broker::{
    processor_fn, Broker, BrokerError, ErrorObserver, ErrorObservers, Processor, ProcessorError,
    QueueHandle, QueueSpec, WorkerHandle, WorkerSpec,
};
pub use env_source::{EnvSource, ProcessEnv};
pub use id_provider::IdProvider;
pub use logger::{Logger, TracingLogger};
pub use time_provider::TimeProvider;
