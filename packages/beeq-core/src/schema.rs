//! The fixed Redis key namespace for a queue, as laid out in the external
//! interface: `{prefix}:{name}:{suffix}` for each of `id`, `jobs`, `waiting`,
//! `active`, `stalling`, `succeeded`, `failed`, `events`.

const ID_SUFFIX: &str = "id";
const JOBS_SUFFIX: &str = "jobs";
const WAITING_SUFFIX: &str = "waiting";
const ACTIVE_SUFFIX: &str = "active";
const STALLING_SUFFIX: &str = "stalling";
const SUCCEEDED_SUFFIX: &str = "succeeded";
const FAILED_SUFFIX: &str = "failed";
const EVENTS_SUFFIX: &str = "events";

/// Precomputed Redis key names for one `(prefix, name)` queue.
///
/// Every component that touches Redis reasons about queue state exclusively
/// through these keys; nothing else names a queue's data in Redis.
#[derive(Debug, Clone)]
pub struct KeySchema {
    id: String,
    jobs: String,
    waiting: String,
    active: String,
    stalling: String,
    succeeded: String,
    failed: String,
    events: String,
}

impl KeySchema {
    /// Build the key schema for a queue named `name` under `prefix`.
    pub fn new(prefix: &str, name: &str) -> Self {
        let base = format!("{prefix}:{name}");
        KeySchema {
            id: format!("{base}:{ID_SUFFIX}"),
            jobs: format!("{base}:{JOBS_SUFFIX}"),
            waiting: format!("{base}:{WAITING_SUFFIX}"),
            active: format!("{base}:{ACTIVE_SUFFIX}"),
            stalling: format!("{base}:{STALLING_SUFFIX}"),
            succeeded: format!("{base}:{SUCCEEDED_SUFFIX}"),
            failed: format!("{base}:{FAILED_SUFFIX}"),
            events: format!("{base}:{EVENTS_SUFFIX}"),
        }
    }

    /// The `id` counter key, `INCR`'d on save.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The `jobs` hash key, `id -> JSON {data, options}`.
    pub fn jobs(&self) -> &str {
        &self.jobs
    }

    /// The `waiting` list key.
    pub fn waiting(&self) -> &str {
        &self.waiting
    }

    /// The `active` list key.
    pub fn active(&self) -> &str {
        &self.active
    }

    /// The `stalling` set key.
    pub fn stalling(&self) -> &str {
        &self.stalling
    }

    /// The `succeeded` set key.
    pub fn succeeded(&self) -> &str {
        &self.succeeded
    }

    /// The `failed` set key.
    pub fn failed(&self) -> &str {
        &self.failed
    }

    /// The `events` pub/sub channel key.
    pub fn events(&self) -> &str {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_expected_keys() {
        let schema = KeySchema::new("bq", "addition");
        assert_eq!(schema.id(), "bq:addition:id");
        assert_eq!(schema.jobs(), "bq:addition:jobs");
        assert_eq!(schema.waiting(), "bq:addition:waiting");
        assert_eq!(schema.active(), "bq:addition:active");
        assert_eq!(schema.stalling(), "bq:addition:stalling");
        assert_eq!(schema.succeeded(), "bq:addition:succeeded");
        assert_eq!(schema.failed(), "bq:addition:failed");
        assert_eq!(schema.events(), "bq:addition:events");
    }
}
