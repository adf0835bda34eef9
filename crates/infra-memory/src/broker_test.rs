// In-memory broker behaviour through the port traits

use crate::InMemoryBroker;
use processor_core::domain::{ConnectionConfig, Job, JobOptions, QueueOptions, WorkerOptions};
use processor_core::port::id_provider::SequenceIdProvider;
use processor_core::port::time_provider::FixedTimeProvider;
use processor_core::port::{
    processor_fn, Broker, BrokerError, Processor, ProcessorError, QueueHandle, QueueSpec,
    WorkerHandle, WorkerSpec,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn broker() -> InMemoryBroker {
    InMemoryBroker::new()
        .with_id_provider(Arc::new(SequenceIdProvider::default()))
        .with_time_provider(Arc::new(FixedTimeProvider::new(1_700_000_000_000)))
}

fn queue(broker: &InMemoryBroker, name: &str) -> Arc<dyn QueueHandle> {
    broker
        .open_queue(QueueSpec {
            name: name.to_string(),
            connection: ConnectionConfig::default(),
            options: QueueOptions::default(),
        })
        .unwrap()
}

fn worker(
    broker: &InMemoryBroker,
    name: &str,
    processor: Arc<dyn Processor>,
    concurrency: usize,
) -> Arc<dyn WorkerHandle> {
    broker
        .open_worker(WorkerSpec {
            name: name.to_string(),
            connection: ConnectionConfig::default(),
            processor,
            options: WorkerOptions {
                concurrency,
                ..Default::default()
            },
        })
        .unwrap()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

#[tokio::test]
async fn test_worker_processes_jobs_from_same_named_queue() {
    let broker = broker();
    let seen = Arc::new(std::sync::Mutex::new(Vec::<Job>::new()));
    let sink = seen.clone();
    let processor = processor_fn(move |job: Job| {
        let sink = sink.clone();
        async move {
            sink.lock().unwrap().push(job.clone());
            Ok(json!({"ok": true}))
        }
    });

    let emails = queue(&broker, "emails");
    let id = emails.add("send", json!({"to": "a@b.c"}), None).await.unwrap();
    assert_eq!(id, "job-1");

    let consumer = worker(&broker, "emails", processor, 1);
    let runner = consumer.clone();
    let run = tokio::spawn(async move { runner.run().await });

    let list = broker.list("bull", "emails");
    let watched = list.clone();
    wait_until(move || watched.counts().completed == 1).await;

    let job = seen.lock().unwrap()[0].clone();
    assert_eq!(job.name, "send");
    assert_eq!(job.queue, "emails");
    assert_eq!(job.data, json!({"to": "a@b.c"}));
    assert_eq!(job.timestamp, 1_700_000_000_000);

    assert_ok!(consumer.close().await);
    assert_ok!(run.await.unwrap());
    assert!(!consumer.is_running());
}

#[tokio::test]
async fn test_failed_job_is_retried_until_attempts_exhausted() {
    let broker = broker();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let processor = processor_fn(move |_job| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Err(ProcessorError::from("smtp down")) }
    });

    let emails = queue(&broker, "emails");
    let opts = JobOptions {
        attempts: 3,
        ..Default::default()
    };
    emails.add("send", json!({}), Some(opts)).await.unwrap();

    let consumer = worker(&broker, "emails", processor, 1);
    let runner = consumer.clone();
    let run = tokio::spawn(async move { runner.run().await });

    let list = broker.list("bull", "emails");
    let watched = list.clone();
    wait_until(move || watched.counts().failed == 1).await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let failed = list.failed();
    assert_eq!(failed[0].reason, "smtp down");
    assert_eq!(failed[0].job.attempts_made, 3);

    assert_ok!(consumer.close().await);
    assert_ok!(run.await.unwrap());
}

#[tokio::test]
async fn test_panicking_processor_fails_job_and_keeps_worker_alive() {
    let broker = broker();
    let processor = processor_fn(|job: Job| async move {
        if job.name == "explode" {
            panic!("kaboom");
        }
        Ok(json!(null))
    });

    let jobs = queue(&broker, "jobs");
    jobs.add("explode", json!({}), None).await.unwrap();
    jobs.add("fine", json!({}), None).await.unwrap();

    let consumer = worker(&broker, "jobs", processor, 1);
    let runner = consumer.clone();
    let run = tokio::spawn(async move { runner.run().await });

    let list = broker.list("bull", "jobs");
    let watched = list.clone();
    wait_until(move || watched.counts().completed == 1 && watched.counts().failed == 1).await;
    assert_eq!(list.failed()[0].reason, "processor panicked: kaboom");

    assert_ok!(consumer.close().await);
    assert_ok!(run.await.unwrap());
}

#[tokio::test]
async fn test_close_waits_for_in_flight_job() {
    let broker = broker();
    let started = Arc::new(tokio::sync::Notify::new());
    let signal = started.clone();
    let finished = Arc::new(AtomicUsize::new(0));
    let done = finished.clone();
    let processor = processor_fn(move |_job| {
        let signal = signal.clone();
        let done = done.clone();
        async move {
            signal.notify_one();
            tokio::time::sleep(Duration::from_millis(50)).await;
            done.fetch_add(1, Ordering::SeqCst);
            Ok(json!(null))
        }
    });

    queue(&broker, "slow").add("work", json!({}), None).await.unwrap();
    let consumer = worker(&broker, "slow", processor, 1);
    let runner = consumer.clone();
    let run = tokio::spawn(async move { runner.run().await });

    started.notified().await;
    assert_ok!(consumer.close().await);

    assert_eq!(finished.load(Ordering::SeqCst), 1);
    assert_eq!(broker.list("bull", "slow").counts().completed, 1);
    assert_ok!(run.await.unwrap());
}

#[tokio::test]
async fn test_concurrency_runs_jobs_in_parallel() {
    let broker = broker();
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (current, max) = (in_flight.clone(), peak.clone());
    let processor = processor_fn(move |_job| {
        let current = current.clone();
        let max = max.clone();
        async move {
            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
            max.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(40)).await;
            current.fetch_sub(1, Ordering::SeqCst);
            Ok(json!(null))
        }
    });

    let jobs = queue(&broker, "batch");
    for i in 0..3 {
        jobs.add("item", json!({ "i": i }), None).await.unwrap();
    }

    let consumer = worker(&broker, "batch", processor, 3);
    let runner = consumer.clone();
    let run = tokio::spawn(async move { runner.run().await });

    let list = broker.list("bull", "batch");
    wait_until(move || list.counts().completed == 3).await;
    assert_eq!(peak.load(Ordering::SeqCst), 3);

    assert_ok!(consumer.close().await);
    assert_ok!(run.await.unwrap());
}

#[tokio::test]
async fn test_add_after_close_is_rejected() {
    let broker = broker();
    let emails = queue(&broker, "emails");

    assert_ok!(emails.close().await);
    assert_ok!(emails.close().await);

    let err = assert_err!(emails.add("send", json!({}), None).await);
    assert_eq!(err, BrokerError::Closed("emails".to_string()));
}

#[tokio::test]
async fn test_zero_attempts_is_invalid() {
    let broker = broker();
    let opts = JobOptions {
        attempts: 0,
        ..Default::default()
    };
    let err = queue(&broker, "emails")
        .add("send", json!({}), Some(opts))
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::InvalidOption(_)));
}

#[tokio::test]
async fn test_run_after_close_and_double_run_fail() {
    let broker = broker();
    let noop = processor_fn(|_job| async { Ok(json!(null)) });

    let closed = worker(&broker, "a", noop.clone(), 1);
    assert_ok!(closed.close().await);
    assert!(matches!(closed.run().await, Err(BrokerError::Closed(_))));

    let twice = worker(&broker, "b", noop, 1);
    let runner = twice.clone();
    let run = tokio::spawn(async move { runner.run().await });
    let watched = twice.clone();
    wait_until(move || watched.is_running()).await;

    assert!(matches!(
        twice.run().await,
        Err(BrokerError::InvalidOption(_))
    ));
    assert_ok!(twice.close().await);
    assert_ok!(run.await.unwrap());
}

#[tokio::test]
async fn test_prefixes_isolate_lists() {
    let broker = broker();
    let custom = broker
        .open_queue(QueueSpec {
            name: "emails".to_string(),
            connection: ConnectionConfig::default(),
            options: QueueOptions {
                prefix: Some("tenant-a".to_string()),
                ..Default::default()
            },
        })
        .unwrap();

    custom.add("send", json!({}), None).await.unwrap();

    assert_eq!(broker.list("tenant-a", "emails").counts().waiting, 1);
    assert_eq!(broker.list("bull", "emails").counts().waiting, 0);
}

#[tokio::test]
async fn test_delayed_job_becomes_available_later() {
    let broker = broker();
    let opts = JobOptions {
        delay: Some(30),
        ..Default::default()
    };
    queue(&broker, "later").add("tick", json!({}), Some(opts)).await.unwrap();

    let list = broker.list("bull", "later");
    assert_eq!(list.counts().delayed, 1);
    assert_eq!(list.counts().waiting, 0);

    let watched = list.clone();
    wait_until(move || watched.counts().waiting == 1).await;
    assert_eq!(list.counts().delayed, 0);
}

#[test]
fn test_zero_concurrency_is_rejected() {
    let broker = broker();
    let result = broker.open_worker(WorkerSpec {
        name: "w".to_string(),
        connection: ConnectionConfig::default(),
        processor: processor_fn(|_job| async { Ok(json!(null)) }),
        options: WorkerOptions {
            concurrency: 0,
            ..Default::default()
        },
    });
    assert!(matches!(result, Err(BrokerError::InvalidOption(_))));
}
