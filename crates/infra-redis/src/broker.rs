// Redis Broker
// Opening a handle only builds a client; the first command connects.

use crate::connection::{connect_timeout, open_client};
use crate::keys::QueueKeys;
use crate::queue::RedisQueue;
use crate::worker::RedisWorker;
use processor_core::port::time_provider::SystemTimeProvider;
use processor_core::port::{
    Broker, BrokerError, QueueHandle, QueueSpec, TimeProvider, WorkerHandle, WorkerSpec,
};
use std::sync::Arc;
use tracing::debug;

pub struct RedisBroker {
    clock: Arc<dyn TimeProvider>,
}

impl RedisBroker {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemTimeProvider),
        }
    }

    pub fn with_time_provider(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }
}

impl Default for RedisBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker for RedisBroker {
    fn name(&self) -> &str {
        "redis"
    }

    fn open_queue(&self, spec: QueueSpec) -> Result<Arc<dyn QueueHandle>, BrokerError> {
        let client = open_client(&spec.connection)?;
        let keys = QueueKeys::new(spec.options.prefix.as_deref(), &spec.name);
        debug!(
            queue = %spec.name,
            key = %keys.wait,
            target = %spec.connection.redacted(),
            "Opening redis queue"
        );
        Ok(Arc::new(RedisQueue::new(
            spec.name,
            keys,
            client,
            connect_timeout(&spec.connection),
            self.clock.clone(),
        )))
    }

    fn open_worker(&self, spec: WorkerSpec) -> Result<Arc<dyn WorkerHandle>, BrokerError> {
        if spec.options.concurrency == 0 {
            return Err(BrokerError::InvalidOption(
                "concurrency must be at least 1".to_string(),
            ));
        }
        let client = open_client(&spec.connection)?;
        let keys = QueueKeys::new(spec.options.prefix.as_deref(), &spec.name);
        debug!(
            worker = %spec.name,
            key = %keys.wait,
            target = %spec.connection.redacted(),
            "Opening redis worker"
        );
        Ok(Arc::new(RedisWorker::new(
            spec.name,
            keys,
            client,
            connect_timeout(&spec.connection),
            spec.processor,
            spec.options.concurrency,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use processor_core::domain::{ConnectionConfig, QueueOptions, WorkerOptions};
    use processor_core::port::processor_fn;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    // Nothing listens on port 1, so every connection attempt is refused
    fn unreachable() -> ConnectionConfig {
        ConnectionConfig {
            port: 1,
            connect_timeout: Some(200),
            ..Default::default()
        }
    }

    fn worker_spec(name: &str, concurrency: usize) -> WorkerSpec {
        WorkerSpec {
            name: name.to_string(),
            connection: unreachable(),
            processor: processor_fn(|_job| async { Ok(json!(null)) }),
            options: WorkerOptions {
                concurrency,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_open_does_not_connect() {
        let broker = RedisBroker::new();
        let queue = broker.open_queue(QueueSpec {
            name: "emails".to_string(),
            connection: unreachable(),
            options: QueueOptions::default(),
        });
        assert!(queue.is_ok());
        assert!(broker.open_worker(worker_spec("emails", 1)).is_ok());
    }

    #[test]
    fn test_invalid_url_fails_open() {
        let broker = RedisBroker::new();
        let result = broker.open_queue(QueueSpec {
            name: "emails".to_string(),
            connection: ConnectionConfig {
                url: Some("::nope::".to_string()),
                ..Default::default()
            },
            options: QueueOptions::default(),
        });
        assert!(matches!(result, Err(BrokerError::InvalidOption(_))));
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let result = RedisBroker::new().open_worker(worker_spec("emails", 0));
        assert!(matches!(result, Err(BrokerError::InvalidOption(_))));
    }

    #[tokio::test]
    async fn test_add_to_closed_queue_fails_without_connecting() {
        let queue = RedisBroker::new()
            .open_queue(QueueSpec {
                name: "emails".to_string(),
                connection: unreachable(),
                options: QueueOptions::default(),
            })
            .unwrap();

        assert_ok!(queue.close().await);
        let err = assert_err!(queue.add("send", json!({}), None).await);
        assert_eq!(err, BrokerError::Closed("emails".to_string()));
    }

    #[tokio::test]
    async fn test_add_reports_connection_failure() {
        let queue = RedisBroker::new()
            .open_queue(QueueSpec {
                name: "emails".to_string(),
                connection: unreachable(),
                options: QueueOptions::default(),
            })
            .unwrap();

        let err = assert_err!(queue.add("send", json!({}), None).await);
        assert!(matches!(err, BrokerError::Connection(_)));
    }

    #[tokio::test]
    async fn test_worker_reports_connection_errors_and_still_closes() {
        let worker = RedisBroker::new()
            .open_worker(worker_spec("emails", 2))
            .unwrap();
        let errors = Arc::new(AtomicUsize::new(0));
        let seen = errors.clone();
        worker.on_error(Arc::new(move |error| {
            assert!(matches!(error, BrokerError::Connection(_)));
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        let runner = worker.clone();
        let run = tokio::spawn(async move { runner.run().await });

        for _ in 0..100 {
            if errors.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(errors.load(Ordering::SeqCst) > 0);

        tokio::time::timeout(Duration::from_secs(3), worker.close())
            .await
            .unwrap()
            .unwrap();
        assert_ok!(run.await.unwrap());
        assert!(!worker.is_running());
    }

    #[tokio::test]
    async fn test_run_after_close_fails() {
        let worker = RedisBroker::new()
            .open_worker(worker_spec("emails", 1))
            .unwrap();
        assert_ok!(worker.close().await);
        assert!(matches!(worker.run().await, Err(BrokerError::Closed(_))));
    }
}
