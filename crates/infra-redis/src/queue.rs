// Redis Queue Handle

use crate::connection::{connect, map_redis_error};
use crate::keys::QueueKeys;
use async_trait::async_trait;
use processor_core::domain::{Job, JobId, JobOptions};
use processor_core::port::{BrokerError, QueueHandle, TimeProvider};
use redis::aio::MultiplexedConnection;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

pub struct RedisQueue {
    name: String,
    keys: QueueKeys,
    client: redis::Client,
    connect_timeout: Duration,
    clock: Arc<dyn TimeProvider>,
    conn: OnceCell<MultiplexedConnection>,
    closed: AtomicBool,
}

impl RedisQueue {
    pub(crate) fn new(
        name: String,
        keys: QueueKeys,
        client: redis::Client,
        connect_timeout: Duration,
        clock: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            name,
            keys,
            client,
            connect_timeout,
            clock,
            conn: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn keys(&self) -> &QueueKeys {
        &self.keys
    }

    // Connects on first use
    async fn connection(&self) -> Result<MultiplexedConnection, BrokerError> {
        self.conn
            .get_or_try_init(|| connect(&self.client, self.connect_timeout))
            .await
            .cloned()
    }
}

#[async_trait]
impl QueueHandle for RedisQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add(
        &self,
        job_name: &str,
        data: serde_json::Value,
        opts: Option<JobOptions>,
    ) -> Result<JobId, BrokerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed(self.name.clone()));
        }
        let opts = opts.unwrap_or_default();
        if opts.attempts == 0 {
            return Err(BrokerError::InvalidOption(
                "attempts must be at least 1".to_string(),
            ));
        }
        if opts.priority.is_some() {
            debug!(queue = %self.name, "Job priority is not supported by the redis adapter; ignored");
        }

        let mut conn = self.connection().await?;
        let id: u64 = redis::cmd("INCR")
            .arg(&self.keys.id)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        let job = Job::new(
            id.to_string(),
            self.clock.now_millis(),
            self.name.clone(),
            job_name,
            data,
            opts,
        );
        let payload =
            serde_json::to_string(&job).map_err(|e| BrokerError::Serialization(e.to_string()))?;

        match job.opts.delay.filter(|ms| *ms > 0) {
            Some(delay_ms) => {
                let wait_key = self.keys.wait.clone();
                let job_id = job.id.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    let pushed: Result<i64, _> = redis::cmd("LPUSH")
                        .arg(&wait_key)
                        .arg(&payload)
                        .query_async(&mut conn)
                        .await;
                    if let Err(e) = pushed {
                        warn!(job_id = %job_id, error = %e, "Failed to enqueue delayed job");
                    }
                });
                debug!(queue = %self.name, job_id = %job.id, delay_ms, "Delayed job added");
            }
            None => {
                let _: i64 = redis::cmd("LPUSH")
                    .arg(&self.keys.wait)
                    .arg(&payload)
                    .query_async(&mut conn)
                    .await
                    .map_err(map_redis_error)?;
                debug!(queue = %self.name, job_id = %job.id, "Job added");
            }
        }
        Ok(job.id)
    }

    async fn close(&self) -> Result<(), BrokerError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(queue = %self.name, "Queue closed");
        }
        Ok(())
    }
}
