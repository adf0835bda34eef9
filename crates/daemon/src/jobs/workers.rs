// Bundled workers

use processor_core::application::{define_worker_in, DefineWorker, JobModule};
use processor_core::domain::Job;
use processor_core::port::{processor_fn, ProcessorError};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct HelloData {
    message: String,
    ts: i64,
}

pub fn hello() -> JobModule {
    JobModule::from_fn("workers/hello", |registry| {
        define_worker_in(registry, DefineWorker::new("hello", processor_fn(process_hello)))?;
        Ok(())
    })
}

pub fn basic() -> JobModule {
    JobModule::from_fn("workers/basic", |registry| {
        define_worker_in(registry, DefineWorker::new("basic", processor_fn(process_basic)))?;
        Ok(())
    })
}

async fn process_hello(job: Job) -> Result<Value, ProcessorError> {
    let data: HelloData = serde_json::from_value(job.data)
        .map_err(|e| ProcessorError::new(format!("invalid hello payload: {}", e)))?;
    Ok(json!({ "echoed": data.message, "processedAt": data.ts }))
}

async fn process_basic(job: Job) -> Result<Value, ProcessorError> {
    Ok(json!({ "ok": true, "received": job.data }))
}
