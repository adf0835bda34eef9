// Bundled queues, each with a periodic producer

use processor_core::application::{define_queue_in, DefineQueue, JobModule, Queue};
use processor_core::port::time_provider::SystemTimeProvider;
use processor_core::port::{BrokerError, TimeProvider};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

const HELLO_EVERY: Duration = Duration::from_secs(5);
const BASIC_EVERY: Duration = Duration::from_secs(10);

pub fn hello() -> JobModule {
    JobModule::from_fn("queues/hello", |registry| {
        let queue = define_queue_in(registry, DefineQueue::new("hello"))?;
        spawn_producer(queue, HELLO_EVERY, "hello", |now| {
            json!({ "message": "hello", "ts": now })
        });
        Ok(())
    })
}

pub fn basic() -> JobModule {
    JobModule::from_fn("queues/basic", |registry| {
        let queue = define_queue_in(registry, DefineQueue::new("basic"))?;
        spawn_producer(queue, BASIC_EVERY, "basic", |now| json!({ "now": now }));
        Ok(())
    })
}

/// Add one job every `every` until the queue is closed
fn spawn_producer(queue: Queue, every: Duration, job_name: &'static str, payload: fn(i64) -> Value) {
    tokio::spawn(async move {
        let clock = SystemTimeProvider;
        let mut ticker = tokio::time::interval(every);
        // First tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match queue.add(job_name, payload(clock.now_millis())).await {
                Ok(job_id) => debug!(queue = %queue.name(), job_id = %job_id, "Produced job"),
                Err(BrokerError::Closed(_)) => break,
                Err(e) => warn!(queue = %queue.name(), error = %e, "Failed to produce job"),
            }
        }
        debug!(queue = %queue.name(), "Producer stopped");
    });
}
