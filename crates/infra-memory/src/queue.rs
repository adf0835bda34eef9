// In-Memory Queue Handle

use crate::store::JobList;
use async_trait::async_trait;
use processor_core::domain::{Job, JobId, JobOptions};
use processor_core::port::{BrokerError, IdProvider, QueueHandle, TimeProvider};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct MemoryQueue {
    name: String,
    list: Arc<JobList>,
    ids: Arc<dyn IdProvider>,
    clock: Arc<dyn TimeProvider>,
    closed: AtomicBool,
}

impl MemoryQueue {
    pub(crate) fn new(
        name: String,
        list: Arc<JobList>,
        ids: Arc<dyn IdProvider>,
        clock: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            name,
            list,
            ids,
            clock,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueHandle for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add(
        &self,
        job_name: &str,
        data: serde_json::Value,
        opts: Option<JobOptions>,
    ) -> Result<JobId, BrokerError> {
        if self.is_closed() {
            return Err(BrokerError::Closed(self.name.clone()));
        }
        let opts = opts.unwrap_or_default();
        if opts.attempts == 0 {
            return Err(BrokerError::InvalidOption(
                "attempts must be at least 1".to_string(),
            ));
        }

        let job = Job::new(
            self.ids.generate_id(),
            self.clock.now_millis(),
            self.name.clone(),
            job_name,
            data,
            opts,
        );
        let id = job.id.clone();

        match job.opts.delay.filter(|ms| *ms > 0) {
            Some(delay_ms) => {
                self.list.mark_delayed();
                let list = self.list.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    list.promote(job);
                });
                debug!(queue = %self.name, job_id = %id, delay_ms, "Delayed job added");
            }
            None => {
                self.list.push(job);
                debug!(queue = %self.name, job_id = %id, "Job added");
            }
        }
        Ok(id)
    }

    async fn close(&self) -> Result<(), BrokerError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(queue = %self.name, "Queue closed");
        }
        Ok(())
    }
}
