use beeq_core::error::Error;
use beeq_core::event::JobEvent;
use beeq_core::job::{Job, JobBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::queue::Queue;

/// A job that has not yet been saved, returned by
/// [`Queue::create_job`](crate::queue::Queue::create_job). Chainable setters
/// mutate it until [`PendingJob::save`] persists it.
#[derive(Debug)]
pub struct PendingJob<T> {
    pub(crate) queue: Queue<T>,
    pub(crate) builder: JobBuilder<T>,
}

impl<T> PendingJob<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub(crate) fn new(queue: Queue<T>, data: T) -> Self {
        PendingJob {
            queue,
            builder: JobBuilder::new(data),
        }
    }

    /// Set the retry budget for this job.
    pub fn retries(mut self, n: u32) -> Self {
        self.builder = self.builder.retries(n);
        self
    }

    /// Set a handler timeout, in milliseconds.
    pub fn timeout(mut self, ms: u64) -> Self {
        self.builder = self.builder.timeout(ms);
        self
    }

    /// Persist the job: `INCR` the id counter, store the record, and push it
    /// onto `waiting`. On any transport failure the job is guaranteed not to
    /// have been enqueued.
    pub async fn save(self) -> Result<JobHandle<T>, Error> {
        let PendingJob { queue, builder } = self;
        let record = builder.into_record();
        let record_json = serde_json::to_string(&record)?;

        let mut conn = queue.command_connection();
        let id = queue
            .scripts()
            .add_job(&mut conn, queue.schema(), &record_json)
            .await?;

        let events = if queue.settings().get_events() {
            Some(queue.registry().insert(id))
        } else {
            None
        };

        tracing::debug!(job_id = id, queue = queue.name(), "job saved");

        Ok(JobHandle {
            job: Job::from_record(id, record),
            events,
        })
    }
}

/// A saved job plus, if `get_events` is enabled on the creating queue, a
/// stream of the lifecycle events published for it: `progress(n)`,
/// `succeeded(result)`, `retrying(err)`, `failed(err)`.
#[derive(Debug)]
pub struct JobHandle<T> {
    job: Job<T>,
    events: Option<mpsc::UnboundedReceiver<JobEvent>>,
}

impl<T> JobHandle<T> {
    /// The id assigned to this job at save time.
    pub fn id(&self) -> u64 {
        self.job.id
    }

    /// The saved job, including the options it was saved with.
    pub fn job(&self) -> &Job<T> {
        &self.job
    }

    /// Await the next lifecycle event for this job, if this handle was
    /// registered for events. Returns `None` once the terminal event has
    /// been delivered and the handle deregistered, or if this queue does not
    /// have `get_events` enabled.
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        match self.events.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }
}
