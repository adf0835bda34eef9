// Panic isolation for job processors
// A panicking processor fails its job instead of killing the consume loop.
use crate::domain::Job;
use crate::port::{Processor, ProcessorError};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::error;

/// Run `processor` on `job`, turning a panic into a [`ProcessorError`]
pub async fn process_guarded(
    processor: &dyn Processor,
    job: Job,
) -> Result<serde_json::Value, ProcessorError> {
    let job_id = job.id.clone();
    match AssertUnwindSafe(processor.process(job)).catch_unwind().await {
        Ok(result) => result,
        Err(panic_info) => {
            let panic_msg = panic_message(panic_info.as_ref());
            error!(job_id = %job_id, panic_msg = %panic_msg, "Job processor panicked");
            Err(ProcessorError(format!("processor panicked: {}", panic_msg)))
        }
    }
}

fn panic_message(panic_info: &(dyn Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
