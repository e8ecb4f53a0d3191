use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HandlerError;
use crate::job::Job;

/// The wire message published to a queue's `events` pub/sub channel.
///
/// `data` is event-specific: a progress number, an arbitrary JSON result, or
/// a serialized [`HandlerError`] for `retrying`/`failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    /// Which lifecycle event this is.
    pub event: EventKind,
    /// The job id this event concerns.
    pub id: u64,
    /// Event-specific payload.
    pub data: Value,
}

/// The four lifecycle events carried on the `events` channel.
///
/// At most one of `Succeeded`/`Failed` is ever published per job
/// (invariant I5); `Retrying` may be published zero or more times strictly
/// before the terminal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// The handler reported progress via `report_progress`.
    Progress,
    /// The job completed successfully.
    Succeeded,
    /// The job failed but will be retried.
    Retrying,
    /// The job failed with no retries left; terminal.
    Failed,
}

/// A per-job event, delivered to the [`JobHandle`] that created the job (via
/// the originating queue's in-process id -> handle registry).
///
/// [`JobHandle`]: ../../beeq_redis/queue/struct.JobHandle.html
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// `progress(n)`: the handler reported a value in `[0, 100]`.
    Progress(u8),
    /// `succeeded(result)`: the terminal success result.
    Succeeded(Value),
    /// `retrying(err)`: a non-terminal handler failure; the job has been
    /// re-enqueued.
    Retrying(HandlerError),
    /// `failed(err)`: the terminal handler failure.
    Failed(HandlerError),
}

/// A queue-level event.
///
/// Two distinct families, matching the external interface's queue-handle
/// surface:
///
/// - `Succeeded`/`Retrying`/`Failed` are emitted directly by *this* queue
///   instance only for jobs it processed as a worker, carrying the full
///   [`Job`] it ran. They are a local side effect of `process`'s disposition
///   step, not routed through the `events` pub/sub channel.
/// - `JobSucceeded`/`JobRetrying`/`JobFailed`/`JobProgress` (the `"job
///   <event>"` family) are fed by the subscriber loop for *every* job on the
///   queue, including ones other queue instances (possibly other processes)
///   processed; they carry only the id, since the subscriber never has the
///   full job in hand.
#[derive(Debug, Clone)]
pub enum QueueEvent<T> {
    /// All atomic scripts are cached and every configured connection is
    /// open; the queue is ready for use.
    Ready,
    /// A transport-level error occurred; the queue keeps running.
    Error(String),
    /// `succeeded(job, result)`: a job this queue processed as a worker
    /// completed successfully.
    Succeeded {
        /// The job as it was run.
        job: Job<T>,
        /// The handler's result.
        result: Value,
    },
    /// `retrying(job, err)`: a job this queue processed as a worker failed
    /// but will be retried.
    Retrying {
        /// The job as it was run.
        job: Job<T>,
        /// The error that triggered the retry.
        err: HandlerError,
    },
    /// `failed(job, err)`: a job this queue processed as a worker failed
    /// terminally.
    Failed {
        /// The job as it was run.
        job: Job<T>,
        /// The terminal error.
        err: HandlerError,
    },
    /// `"job progress"`: some job reported progress.
    JobProgress {
        /// The job id.
        id: u64,
        /// The reported progress value.
        data: u8,
    },
    /// `"job succeeded"`: some job completed successfully.
    JobSucceeded {
        /// The job id.
        id: u64,
        /// The job's result.
        data: Value,
    },
    /// `"job retrying"`: some job failed and will be retried.
    JobRetrying {
        /// The job id.
        id: u64,
        /// The handler error that triggered the retry.
        err: HandlerError,
    },
    /// `"job failed"`: some job failed terminally.
    JobFailed {
        /// The job id.
        id: u64,
        /// The terminal handler error.
        err: HandlerError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_message_round_trips_through_json() {
        let msg = EventMessage {
            event: EventKind::Progress,
            id: 7,
            data: serde_json::json!(50),
        };
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: EventMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.id, 7);
        assert_eq!(decoded.event, EventKind::Progress);
        assert_eq!(decoded.data, serde_json::json!(50));
    }

    #[test]
    fn handler_error_omits_stack_when_absent() {
        let err = HandlerError::new("boom");
        let encoded = serde_json::to_string(&err).unwrap();
        assert_eq!(encoded, r#"{"message":"boom"}"#);
    }
}
