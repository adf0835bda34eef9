// Redis Worker Handle
// Each consume loop owns a connection and polls with a bounded BRPOP, so a
// close request is observed within one poll interval and no popped job is dropped.

use crate::connection::{connect, map_redis_error};
use crate::keys::QueueKeys;
use async_trait::async_trait;
use processor_core::application::process_guarded;
use processor_core::domain::Job;
use processor_core::port::{BrokerError, ErrorObserver, ErrorObservers, Processor, WorkerHandle};
use redis::aio::MultiplexedConnection;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// BRPOP timeout in seconds
const POLL_TIMEOUT_SECS: u64 = 1;

/// Pause before reconnecting after a connection error
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

pub struct RedisWorker {
    name: String,
    keys: QueueKeys,
    client: redis::Client,
    connect_timeout: Duration,
    processor: Arc<dyn Processor>,
    concurrency: usize,
    observers: ErrorObservers,
    shutdown: watch::Sender<bool>,
    active: watch::Sender<bool>,
}

impl RedisWorker {
    pub(crate) fn new(
        name: String,
        keys: QueueKeys,
        client: redis::Client,
        connect_timeout: Duration,
        processor: Arc<dyn Processor>,
        concurrency: usize,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let (active, _) = watch::channel(false);
        Self {
            name,
            keys,
            client,
            connect_timeout,
            processor,
            concurrency,
            observers: ErrorObservers::default(),
            shutdown,
            active,
        }
    }

    fn consume_loop(&self, slot: usize) -> ConsumeLoop {
        ConsumeLoop {
            worker: self.name.clone(),
            slot,
            keys: self.keys.clone(),
            client: self.client.clone(),
            connect_timeout: self.connect_timeout,
            processor: self.processor.clone(),
            observers: self.observers.clone(),
            shutdown: self.shutdown.subscribe(),
        }
    }
}

#[async_trait]
impl WorkerHandle for RedisWorker {
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

        info!(worker = %self.name, concurrency = self.concurrency, key = %self.keys.wait, "Worker running");
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
    keys: QueueKeys,
    client: redis::Client,
    connect_timeout: Duration,
    processor: Arc<dyn Processor>,
    observers: ErrorObservers,
    shutdown: watch::Receiver<bool>,
}

impl ConsumeLoop {
    async fn run(mut self) {
        let mut cached: Option<MultiplexedConnection> = None;

        while !self.is_closed() {
            let mut conn = match cached.clone() {
                Some(conn) => conn,
                None => match connect(&self.client, self.connect_timeout).await {
                    Ok(conn) => {
                        cached = Some(conn.clone());
                        conn
                    }
                    Err(e) => {
                        self.report(e);
                        self.back_off().await;
                        continue;
                    }
                },
            };

            let popped: Result<Option<(String, String)>, _> = redis::cmd("BRPOP")
                .arg(&self.keys.wait)
                .arg(POLL_TIMEOUT_SECS)
                .query_async(&mut conn)
                .await;

            match popped {
                Ok(Some((_key, payload))) => self.handle(&mut conn, payload).await,
                Ok(None) => {}
                Err(e) => {
                    let error = map_redis_error(e);
                    if matches!(error, BrokerError::Connection(_)) {
                        cached = None;
                    }
                    self.report(error);
                    self.back_off().await;
                }
            }
        }
        debug!(worker = %self.worker, slot = self.slot, "Consume loop finished");
    }

    async fn handle(&self, conn: &mut MultiplexedConnection, payload: String) {
        let mut job: Job = match serde_json::from_str(&payload) {
            Ok(job) => job,
            Err(e) => {
                self.report(BrokerError::Serialization(format!(
                    "undecodable job on {}: {}",
                    self.keys.wait, e
                )));
                return;
            }
        };
        let job_id = job.id.clone();

        let stored = match process_guarded(self.processor.as_ref(), job.clone()).await {
            Ok(_) => {
                debug!(worker = %self.worker, job_id = %job_id, "Job completed");
                redis::cmd("INCR")
                    .arg(&self.keys.completed)
                    .query_async::<_, i64>(conn)
                    .await
            }
            Err(e) if job.record_failure() => {
                warn!(
                    worker = %self.worker,
                    job_id = %job_id,
                    attempt = job.attempts_made,
                    max_attempts = job.opts.attempts,
                    error = %e,
                    "Job failed, retrying"
                );
                match serde_json::to_string(&job) {
                    Ok(retry) => {
                        redis::cmd("LPUSH")
                            .arg(&self.keys.wait)
                            .arg(retry)
                            .query_async::<_, i64>(conn)
                            .await
                    }
                    Err(e) => {
                        self.report(BrokerError::Serialization(e.to_string()));
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(
                    worker = %self.worker,
                    job_id = %job_id,
                    attempts = job.attempts_made,
                    error = %e,
                    "Job failed permanently"
                );
                let entry = serde_json::json!({ "job": job, "reason": e.0 });
                redis::cmd("LPUSH")
                    .arg(&self.keys.failed)
                    .arg(entry.to_string())
                    .query_async::<_, i64>(conn)
                    .await
            }
        };

        if let Err(e) = stored {
            self.report(map_redis_error(e));
        }
    }

    fn report(&self, error: BrokerError) {
        if self.observers.emit(&error) == 0 {
            warn!(worker = %self.worker, error = %error, "Unobserved worker error");
        }
    }

    async fn back_off(&mut self) {
        tokio::select! {
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            _ = closed(&mut self.shutdown) => {}
        }
    }

    fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }
}

async fn closed(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|closed| *closed).await;
}
