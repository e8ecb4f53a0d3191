use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use beeq_core::error::{Error, HandlerError};
use beeq_core::event::{EventKind, EventMessage, QueueEvent};
use beeq_core::job::{Job, JobRecord};
use redis::aio::MultiplexedConnection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::queue::{catch_exceptions, HandlerContext, Queue};

/// Spawn the cooperative fetch/dispatch loop described in the worker loop
/// design: a dedicated blocking connection drives `BRPOPLPUSH waiting ->
/// active`, gated by a semaphore sized to `concurrency` so the loop never
/// fetches past it.
pub(crate) fn spawn_fetch_loop<T, F, Fut>(
    queue: Queue<T>,
    mut conn: MultiplexedConnection,
    semaphore: Arc<Semaphore>,
    handler: Arc<F>,
) -> JoinHandle<()>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    F: Fn(Job<T>, HandlerContext<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    let mut shutdown_rx = queue.shutdown_receiver();
    let waiting_key = queue.schema().waiting().to_string();
    let active_key = queue.schema().active().to_string();

    tokio::spawn(async move {
        loop {
            let permit = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let popped: Result<Option<String>, redis::RedisError> = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    drop(permit);
                    break;
                }
                res = redis::cmd("BRPOPLPUSH")
                    .arg(&waiting_key)
                    .arg(&active_key)
                    .arg(0)
                    .query_async(&mut conn) => res,
            };

            match popped {
                Ok(Some(id_str)) => match id_str.parse::<u64>() {
                    Ok(id) => {
                        let queue = queue.clone();
                        let handler = handler.clone();
                        let events = queue.queue_events().clone();
                        tokio::spawn(async move {
                            if let Err(join_err) =
                                tokio::spawn(dispatch(queue, id, handler, permit)).await
                            {
                                // Only reachable when `catch_exceptions` is off and the
                                // handler itself panicked; `dispatch` never panics on its
                                // own error paths.
                                tracing::error!(job_id = id, error = %join_err, "handler panicked");
                                let _ = events.send(QueueEvent::Error(format!(
                                    "job {id} handler panicked: {join_err}"
                                )));
                            }
                        });
                    }
                    Err(_) => {
                        tracing::warn!(raw = %id_str, "ignoring non-numeric job id on waiting list");
                        drop(permit);
                    }
                },
                Ok(None) => drop(permit),
                Err(e) => {
                    tracing::warn!(error = %e, "fetch failed, backing off");
                    drop(permit);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    })
}

/// Fetch a single job's data, heartbeat it out of `stalling`, run the
/// handler to completion (or timeout), and apply its terminal disposition.
/// The permit is held for the full lifetime of this function so the fetch
/// loop's concurrency cap is respected for exactly as long as the handler is
/// in flight.
async fn dispatch<T, F, Fut>(queue: Queue<T>, id: u64, handler: Arc<F>, _permit: OwnedSemaphorePermit)
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    F: Fn(Job<T>, HandlerContext<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    let mut conn = queue.command_connection();

    // Heartbeat: signal liveness for this job's current stalling window
    // before doing anything else, so a supervisor snapshot taken while we
    // were mid-fetch does not immediately flag us as stalled.
    let _: Result<i64, _> = redis::cmd("SREM")
        .arg(queue.schema().stalling())
        .arg(id)
        .query_async(&mut conn)
        .await;

    let raw: Option<String> = match redis::cmd("HGET")
        .arg(queue.schema().jobs())
        .arg(id)
        .query_async(&mut conn)
        .await
    {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(job_id = id, error = %e, "failed to fetch job data");
            return;
        }
    };

    let record: JobRecord<T> = match raw {
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(job_id = id, error = %e, "job data failed to decode, dropping");
                return;
            }
        },
        None => {
            tracing::warn!(job_id = id, "job data missing in jobs hash, dropping");
            return;
        }
    };

    let job = Job::from_record(id, record);
    tracing::debug!(job_id = id, queue = queue.name(), "job started");

    run_and_finish(queue, job, handler).await;
}

async fn run_and_finish<T, F, Fut>(queue: Queue<T>, job: Job<T>, handler: Arc<F>)
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    F: Fn(Job<T>, HandlerContext<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    let id = job.id;
    let catch_exceptions_enabled = queue.settings().catch_exceptions();
    let timeout_ms = job.options.timeout;
    let retries_left = job.options.retries;

    let ctx = HandlerContext {
        id,
        queue: queue.clone(),
    };
    let handler_fut = (handler)(job.clone(), ctx);

    let run = async move {
        if catch_exceptions_enabled {
            catch_exceptions(handler_fut).await
        } else {
            handler_fut.await
        }
    };

    let outcome: Result<Value, HandlerError> = match timeout_ms {
        Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), run).await {
            Ok(result) => result,
            Err(_) => Err(HandlerError::new(format!(
                "job {id} timed out after {ms}ms"
            ))),
        },
        None => run.await,
    };

    let disposition = match outcome {
        Ok(value) => Disposition::Success(value),
        Err(err) if retries_left > 0 => Disposition::Retry(err),
        Err(err) => Disposition::Fail(err),
    };

    if let Err(e) = apply_disposition(&queue, &job, disposition).await {
        tracing::warn!(job_id = id, error = %e, "failed to apply job disposition");
    }
}

enum Disposition {
    Success(Value),
    Retry(HandlerError),
    Fail(HandlerError),
}

async fn apply_disposition<T>(
    queue: &Queue<T>,
    job: &Job<T>,
    disposition: Disposition,
) -> Result<(), Error>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    let id = job.id;
    let (outcome, updated_record_json, event, local_event) = match disposition {
        Disposition::Success(value) => {
            tracing::info!(job_id = id, queue = queue.name(), "job succeeded");
            let local_event = QueueEvent::Succeeded {
                job: job.clone(),
                result: value.clone(),
            };
            (
                "success",
                String::new(),
                EventMessage {
                    event: EventKind::Succeeded,
                    id,
                    data: value,
                },
                local_event,
            )
        }
        Disposition::Retry(err) => {
            tracing::warn!(job_id = id, queue = queue.name(), error = %err, "job failed, retrying");
            let mut options = job.options.clone();
            options.retries -= 1;
            let record = JobRecord {
                data: job.data.clone(),
                options,
            };
            let local_event = QueueEvent::Retrying {
                job: job.clone(),
                err: err.clone(),
            };
            (
                "retry",
                serde_json::to_string(&record)?,
                EventMessage {
                    event: EventKind::Retrying,
                    id,
                    data: serde_json::to_value(&err)?,
                },
                local_event,
            )
        }
        Disposition::Fail(err) => {
            tracing::error!(job_id = id, queue = queue.name(), error = %err, "job failed terminally");
            let local_event = QueueEvent::Failed {
                job: job.clone(),
                err: err.clone(),
            };
            (
                "fail",
                String::new(),
                EventMessage {
                    event: EventKind::Failed,
                    id,
                    data: serde_json::to_value(&err)?,
                },
                local_event,
            )
        }
    };

    let event_json = serde_json::to_string(&event)?;
    let mut conn = queue.command_connection();
    queue
        .scripts()
        .finish_job(
            &mut conn,
            queue.schema(),
            id,
            outcome,
            queue.settings().remove_on_success(),
            &updated_record_json,
            &event_json,
            queue.settings().send_events(),
        )
        .await?;

    // Emitted directly by this queue instance for jobs it processed as a
    // worker, regardless of `send_events` -- distinct from the `"job
    // <event>"` family the subscriber loop derives from the pub/sub channel.
    let _ = queue.queue_events().send(local_event);
    Ok(())
}
