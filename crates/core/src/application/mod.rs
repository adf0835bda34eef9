// Application Layer - Registry, Handles and Process Lifecycle

pub mod connection;
pub mod define;
pub mod handle;
pub mod orchestrator;
pub mod panic_guard;
pub mod registry;


// Re-exports
pub use connection::{resolve_connection, ConnectionResolver};
pub use define::{
    define_queue, define_queue_in, define_worker, define_worker_in, DefineQueue, DefineWorker,
};
pub use handle::{Queue, Worker};
pub use orchestrator::{
    shutdown_channel, stream_error_channel, ExitStatus, GuardedWriter, JobModule, Orchestrator,
    OrchestratorConfig, OrchestratorError, OrchestratorState, ShutdownOutcome, ShutdownSender,
    ShutdownToken, ShutdownTrigger, StreamErrorReceiver, StreamErrorSink,
};
pub use panic_guard::process_guarded;
pub use registry::{CloseFailure, HandleKind, Registry, StopReport};
