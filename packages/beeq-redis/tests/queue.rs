use std::time::Duration;

use beeq_core::error::HandlerError;
use beeq_core::event::{JobEvent, QueueEvent};
use beeq_core::job::Job;
use beeq_core::settings::Settings;
use beeq_redis::queue::{HandlerContext, Queue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Addition {
    x: i64,
    y: i64,
}

fn unique_name(label: &str) -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("beeq-test-{label}-{}-{n}", std::process::id())
}

async fn test_settings(name: &str) -> Settings {
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
    Settings::default()
        .set_redis_url(redis_url)
        .set_prefix(format!("beeq-test:{name}"))
        .set_stall_interval(Duration::from_millis(200))
}

/// Every test in this module requires a real local Redis instance reachable
/// at `REDIS_URL` (or `redis://127.0.0.1/`), exactly as the Redis storage
/// layer this worker loop is grounded on requires for its own test suite.
/// Tests must run sequentially: queue names are unique per test, but a
/// shared Redis instance still serializes the connections.
#[tokio::test]
async fn basic_success() {
    let name = unique_name("basic-success");
    let settings = test_settings(&name).await;
    let queue: Queue<Addition> = Queue::new(name, settings).await.expect("connect");

    let handle = queue
        .create_job(Addition { x: 2, y: 3 })
        .save()
        .await
        .expect("save job");
    let id = handle.id();

    queue
        .process(2, |job: Job<Addition>, ctx: HandlerContext<Addition>| async move {
            let _ = ctx.report_progress(100).await;
            Ok(Value::from(job.data().x + job.data().y))
        })
        .await
        .expect("process");

    let mut handle = handle;

    // The handler reports progress before returning, so that publish lands on
    // the `events` channel strictly before `finish_job`'s `succeeded` publish.
    let progress = tokio::time::timeout(Duration::from_secs(5), handle.next_event())
        .await
        .expect("progress event arrived in time")
        .expect("some event");
    match progress {
        JobEvent::Progress(n) => assert_eq!(n, 100),
        other => panic!("expected Progress, got {other:?}"),
    }

    let event = tokio::time::timeout(Duration::from_secs(5), handle.next_event())
        .await
        .expect("event arrived in time")
        .expect("some event");

    match event {
        JobEvent::Succeeded(result) => assert_eq!(result, Value::from(5)),
        other => panic!("expected Succeeded, got {other:?}"),
    }

    // Give the finish_job script a moment to land before checking membership.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let stored = queue.get_job(id).await.expect("get_job");
    assert!(stored.is_some(), "succeeded job should still be stored");

    queue.close().await.expect("close");
}

/// The worker-local `succeeded(job, result)` family is emitted directly by
/// this queue instance for jobs it processed, distinct from the `"job
/// succeeded"` family routed through the pub/sub subscriber.
#[tokio::test]
async fn local_succeeded_event_carries_the_full_job() {
    let name = unique_name("local-succeeded-event");
    let settings = test_settings(&name).await;
    let queue: Queue<Addition> = Queue::new(name, settings).await.expect("connect");
    let mut queue_events = queue.events();

    let handle = queue
        .create_job(Addition { x: 10, y: 20 })
        .save()
        .await
        .expect("save job");
    let id = handle.id();

    queue
        .process(1, |job: Job<Addition>, _ctx| async move {
            Ok(Value::from(job.data().x + job.data().y))
        })
        .await
        .expect("process");

    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), queue_events.recv())
            .await
            .expect("queue event arrived in time")
            .expect("queue events channel still open");
        match event {
            QueueEvent::Succeeded { job, result } => {
                assert_eq!(job.id, id);
                assert_eq!(result, Value::from(30));
                break;
            }
            QueueEvent::JobProgress { .. } | QueueEvent::JobSucceeded { .. } => continue,
            other => panic!("expected Succeeded, got {other:?}"),
        }
    }

    queue.close().await.expect("close");
}

#[tokio::test]
async fn retry_then_succeed() {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    let name = unique_name("retry-then-succeed");
    let settings = test_settings(&name).await;
    let queue: Queue<Addition> = Queue::new(name, settings).await.expect("connect");

    let mut handle = queue
        .create_job(Addition { x: 3, y: 4 })
        .retries(2)
        .save()
        .await
        .expect("save job");

    let attempts = Arc::new(AtomicU32::new(0));
    let attempts_in_handler = attempts.clone();

    queue
        .process(1, move |job: Job<Addition>, _ctx| {
            let attempts = attempts_in_handler.clone();
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(HandlerError::new("boom"))
                } else {
                    Ok(Value::from(job.data().x + job.data().y))
                }
            }
        })
        .await
        .expect("process");

    let first = tokio::time::timeout(Duration::from_secs(5), handle.next_event())
        .await
        .expect("first event")
        .expect("some event");
    assert!(matches!(first, JobEvent::Retrying(_)));

    let second = tokio::time::timeout(Duration::from_secs(5), handle.next_event())
        .await
        .expect("second event")
        .expect("some event");
    match second {
        JobEvent::Succeeded(result) => assert_eq!(result, Value::from(7)),
        other => panic!("expected Succeeded, got {other:?}"),
    }

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    queue.close().await.expect("close");
}

#[tokio::test]
async fn terminal_failure_with_no_retries() {
    let name = unique_name("terminal-failure");
    let settings = test_settings(&name).await;
    let queue: Queue<Addition> = Queue::new(name, settings).await.expect("connect");

    let mut handle = queue
        .create_job(Addition { x: 1, y: 1 })
        .save()
        .await
        .expect("save job");

    queue
        .process(1, |_job: Job<Addition>, _ctx| async move {
            Err(HandlerError::new("nope"))
        })
        .await
        .expect("process");

    let event = tokio::time::timeout(Duration::from_secs(5), handle.next_event())
        .await
        .expect("event arrived")
        .expect("some event");
    match event {
        JobEvent::Failed(err) => assert_eq!(err.message, "nope"),
        other => panic!("expected Failed, got {other:?}"),
    }

    queue.close().await.expect("close");
}

#[tokio::test]
async fn process_called_twice_is_misuse() {
    let name = unique_name("process-twice");
    let settings = test_settings(&name).await;
    let queue: Queue<Addition> = Queue::new(name, settings).await.expect("connect");

    queue
        .process(1, |_job: Job<Addition>, _ctx| async move { Ok(Value::Null) })
        .await
        .expect("first process call");

    let second = queue
        .process(1, |_job: Job<Addition>, _ctx| async move { Ok(Value::Null) })
        .await;
    assert!(second.is_err());

    queue.close().await.expect("close");
}

#[tokio::test]
async fn stall_recovery_reenqueues_abandoned_job() {
    let name = unique_name("stall-recovery");
    let settings = test_settings(&name).await;
    let producer: Queue<Addition> = Queue::new(name.clone(), settings.clone())
        .await
        .expect("connect producer");

    let job = producer
        .create_job(Addition { x: 9, y: 1 })
        .save()
        .await
        .expect("save job");
    let id = job.id();

    // Simulate a worker that fetches the job (moving it onto `active`) and
    // then crashes without ever disposing of it: pop directly with
    // BRPOPLPUSH instead of going through `process`.
    let mut conn = producer.get_connection();
    let popped: Option<String> = redis::cmd("BRPOPLPUSH")
        .arg(producer.get_schema().waiting())
        .arg(producer.get_schema().active())
        .arg(0)
        .query_async(&mut conn)
        .await
        .expect("brpoplpush");
    assert_eq!(popped, Some(id.to_string()));

    // First tick: nothing in `stalling` yet (the abandoned worker never ran
    // its own supervisor), so this only seeds the snapshot.
    producer.check_stalled_jobs().await.expect("first scan");
    // Second tick: the id is now in `stalling` with nobody having removed
    // it, so it is presumed stalled and pushed back to `waiting`.
    producer.check_stalled_jobs().await.expect("second scan");

    let waiting_len: i64 = redis::cmd("LLEN")
        .arg(producer.get_schema().waiting())
        .query_async(&mut conn)
        .await
        .expect("llen");
    assert_eq!(waiting_len, 1, "recovered job should be back in waiting");

    producer.close().await.expect("close");
}
