use beeq_core::error::Error;
use beeq_core::event::{EventKind, EventMessage, JobEvent, QueueEvent};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::queue::Queue;

/// Open the dedicated subscriber connection for `queue.events()` and spawn
/// the task that decodes and dispatches every message published to it:
/// first as a queue-level `"job <event>"`, then, if a [`JobHandle`] is
/// registered for the id, as a per-job event (deregistering it on the
/// terminal event).
///
/// [`JobHandle`]: crate::pending_job::JobHandle
pub(crate) async fn spawn_subscriber<T>(queue: Queue<T>) -> Result<JoinHandle<()>, Error>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    let mut pubsub = queue
        .client()
        .get_async_pubsub()
        .await
        .map_err(Error::transport)?;
    pubsub
        .subscribe(queue.schema().events())
        .await
        .map_err(Error::transport)?;

    let mut shutdown_rx = queue.shutdown_receiver();

    let handle = tokio::spawn(async move {
        let mut stream = pubsub.on_message();
        loop {
            let message = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                message = stream.next() => message,
            };
            let Some(message) = message else {
                break;
            };
            let payload: String = match message.get_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read event payload");
                    continue;
                }
            };
            let event: EventMessage = match serde_json::from_str(&payload) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to decode event message");
                    continue;
                }
            };
            dispatch_event(&queue, event);
        }
    });

    Ok(handle)
}

fn dispatch_event<T>(queue: &Queue<T>, msg: EventMessage)
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    let id = msg.id;

    let queue_event = match msg.event {
        EventKind::Progress => QueueEvent::JobProgress {
            id,
            data: msg.data.as_u64().unwrap_or_default() as u8,
        },
        EventKind::Succeeded => QueueEvent::JobSucceeded {
            id,
            data: msg.data.clone(),
        },
        EventKind::Retrying => QueueEvent::JobRetrying {
            id,
            err: decode_handler_error(&msg.data),
        },
        EventKind::Failed => QueueEvent::JobFailed {
            id,
            err: decode_handler_error(&msg.data),
        },
    };
    let _ = queue.queue_events().send(queue_event);

    let job_event = match msg.event {
        EventKind::Progress => JobEvent::Progress(msg.data.as_u64().unwrap_or_default() as u8),
        EventKind::Succeeded => JobEvent::Succeeded(msg.data),
        EventKind::Retrying => JobEvent::Retrying(decode_handler_error(&msg.data)),
        EventKind::Failed => JobEvent::Failed(decode_handler_error(&msg.data)),
    };
    let is_terminal = matches!(msg.event, EventKind::Succeeded | EventKind::Failed);
    queue.registry().route(id, job_event);
    if is_terminal {
        queue.registry().remove(id);
    }
}

fn decode_handler_error(data: &serde_json::Value) -> beeq_core::error::HandlerError {
    serde_json::from_value(data.clone())
        .unwrap_or_else(|_| beeq_core::error::HandlerError::new(data.to_string()))
}
