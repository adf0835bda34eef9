// In-Memory Worker Handle
// `concurrency` consume loops share one job list. Close lets in-flight jobs finish.

use crate::store::JobList;
use async_trait::async_trait;
use processor_core::application::process_guarded;
use processor_core::domain::Job;
use processor_core::port::{BrokerError, ErrorObserver, ErrorObservers, Processor, WorkerHandle};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub struct MemoryWorker {
    name: String,
    list: Arc<JobList>,
    processor: Arc<dyn Processor>,
    concurrency: usize,
    observers: ErrorObservers,
    shutdown: watch::Sender<bool>,
    active: watch::Sender<bool>,
}

impl MemoryWorker {
    pub(crate) fn new(
        name: String,
        list: Arc<JobList>,
        processor: Arc<dyn Processor>,
        concurrency: usize,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let (active, _) = watch::channel(false);
        Self {
            name,
            list,
            processor,
            concurrency: concurrency.max(1),
            observers: ErrorObservers::default(),
            shutdown,
            active,
        }
    }

    fn consume_loop(&self, slot: usize) -> ConsumeLoop {
        ConsumeLoop {
            worker: self.name.clone(),
            slot,
            list: self.list.clone(),
            processor: self.processor.clone(),
            shutdown: self.shutdown.subscribe(),
        }
    }
}

#[async_trait]
impl WorkerHandle for MemoryWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_error(&self, observer: ErrorObserver) {
        self.observers.attach(observer);
    }

    async fn run(&self) -> Result<(), BrokerError> {
        if *self.shutdown.borrow() {
            return Err(BrokerError::Closed(self.name.clone()));
        }
        if self.active.send_replace(true) {
            return Err(BrokerError::InvalidOption(format!(
                "worker `{}` is already running",
                self.name
            )));
        }

        info!(worker = %self.name, concurrency = self.concurrency, queue = %self.list.key(), "Worker running");
        let mut loops = JoinSet::new();
        for slot in 0..self.concurrency {
            loops.spawn(self.consume_loop(slot).run());
        }

        while let Some(joined) = loops.join_next().await {
            if let Err(e) = joined {
                let error = BrokerError::Command(format!("consume loop aborted: {}", e));
                self.observers.emit(&error);
            }
        }

        self.active.send_replace(false);
        info!(worker = %self.name, "Worker stopped");
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.shutdown.send_replace(true);
        let mut active = self.active.subscribe();
        // Sender lives in self, so this only returns once `run` has finished
        let _ = active.wait_for(|running| !*running).await;
        debug!(worker = %self.name, "Worker closed");
        Ok(())
    }

    fn is_running(&self) -> bool {
        *self.active.borrow()
    }
}

struct ConsumeLoop {
    worker: String,
    slot: usize,
    list: Arc<JobList>,
    processor: Arc<dyn Processor>,
    shutdown: watch::Receiver<bool>,
}

impl ConsumeLoop {
    async fn run(mut self) {
        loop {
            let job = tokio::select! {
                biased;
                _ = closed(&mut self.shutdown) => break,
                job = self.list.pop() => job,
            };
            self.handle(job).await;
        }
        debug!(worker = %self.worker, slot = self.slot, "Consume loop finished");
    }

    async fn handle(&self, job: Job) {
        let job_id = job.id.clone();
        match process_guarded(self.processor.as_ref(), job.clone()).await {
            Ok(_) => {
                debug!(worker = %self.worker, job_id = %job_id, "Job completed");
                self.list.complete(job);
            }
            Err(e) => {
                let mut job = job;
                if job.record_failure() {
                    warn!(
                        worker = %self.worker,
                        job_id = %job_id,
                        attempt = job.attempts_made,
                        max_attempts = job.opts.attempts,
                        error = %e,
                        "Job failed, retrying"
                    );
                    self.list.retry(job);
                } else {
                    warn!(
                        worker = %self.worker,
                        job_id = %job_id,
                        attempts = job.attempts_made,
                        error = %e,
                        "Job failed permanently"
                    );
                    self.list.fail(job, e.0);
                }
            }
        }
    }
}

async fn closed(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|closed| *closed).await;
}
