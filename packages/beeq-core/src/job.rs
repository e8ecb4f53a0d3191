use serde::{Deserialize, Serialize};

/// Runtime options attached to a job, carried alongside its payload in the
/// `jobs` hash and decremented on retry (I4 in the queue's invariants).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobOptions {
    /// Remaining retry budget. Strictly decreases on each retry; a job whose
    /// retries have reached zero and fails is terminal.
    #[serde(default)]
    pub retries: u32,

    /// Optional handler timeout in milliseconds. `None` means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Default for JobOptions {
    fn default() -> Self {
        JobOptions {
            retries: 0,
            timeout: None,
        }
    }
}

/// The status derived from which set or list a job currently resides in.
/// Never persisted directly: it is inferred from membership, not stored as a
/// field (see invariant I1 — a job is in exactly one of these at a time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// In the `waiting` list, awaiting fetch.
    Waiting,
    /// In the `active` list, currently owned by a worker.
    Active,
    /// In the `succeeded` set (unless purged by `remove_on_success`).
    Succeeded,
    /// In the `failed` set; retries are exhausted.
    Failed,
}

/// The encoded form of a job as it is stored in the `jobs` hash: `{data,
/// options}`. `data` is the caller's opaque JSON-serializable payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord<T> {
    /// The user-supplied payload.
    pub data: T,
    /// Retry/timeout options.
    pub options: JobOptions,
}

/// A saved job: an id plus the record it was saved with.
///
/// `progress` is meaningful only while the job is actively executing; it is
/// not persisted in the `jobs` hash, only carried on `progress` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job<T> {
    /// Monotonically increasing id, unique within the queue, assigned by
    /// `INCR` at save time (invariant I3: never reused, even across
    /// retries).
    pub id: u64,
    /// The user-supplied payload.
    pub data: T,
    /// Retry/timeout options.
    pub options: JobOptions,
    /// Last progress value reported by the currently executing handler, if
    /// any has been observed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

impl<T> Job<T> {
    /// Build a saved [`Job`] from an id and the record it was stored with.
    /// Used by `beeq-redis` wherever a job is read back out of the `jobs`
    /// hash (save, fetch, `get_job`).
    pub fn from_record(id: u64, record: JobRecord<T>) -> Self {
        Job {
            id,
            data: record.data,
            options: record.options,
            progress: None,
        }
    }

    /// Borrow the user payload.
    pub fn data(&self) -> &T {
        &self.data
    }
}

/// A not-yet-saved job, built with chainable setters before `save`.
///
/// Mirrors the queue's `createJob(data)` producer path: defaults to
/// `retries = 0`, no timeout, and is mutated in place until `save` is called.
#[derive(Debug, Clone)]
pub struct JobBuilder<T> {
    data: T,
    options: JobOptions,
}

impl<T> JobBuilder<T> {
    /// Start building a job around the given payload, with defaulted
    /// options.
    pub fn new(data: T) -> Self {
        JobBuilder {
            data,
            options: JobOptions::default(),
        }
    }

    /// Set the retry budget for this job.
    pub fn retries(mut self, n: u32) -> Self {
        self.options.retries = n;
        self
    }

    /// Set a handler timeout, in milliseconds.
    pub fn timeout(mut self, ms: u64) -> Self {
        self.options.timeout = Some(ms);
        self
    }

    /// Consume the builder into the `{data, options}` record that gets
    /// persisted. Used by `beeq-redis`'s save path.
    pub fn into_record(self) -> JobRecord<T> {
        JobRecord {
            data: self.data,
            options: self.options,
        }
    }
}
