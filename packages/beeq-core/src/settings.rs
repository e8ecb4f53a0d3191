use std::time::Duration;

/// Queue-wide settings, with defaults matching the documented behavior of a
/// queue that nobody has configured.
///
/// Named and shaped after the `Config` builder in the Redis storage layer
/// this crate's worker loop is grounded on: a plain `Default` impl plus
/// `set_*`/`get_*` accessor pairs, here renamed to the settings names this
/// queue's external interface actually documents (`prefix`,
/// `stall_interval`, ...).
#[derive(Debug, Clone)]
pub struct Settings {
    prefix: String,
    stall_interval: Duration,
    redis_url: String,
    is_worker: bool,
    get_events: bool,
    send_events: bool,
    remove_on_success: bool,
    catch_exceptions: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            prefix: String::from("bq"),
            stall_interval: Duration::from_millis(5000),
            redis_url: String::from("redis://127.0.0.1/"),
            is_worker: true,
            get_events: true,
            send_events: true,
            remove_on_success: false,
            catch_exceptions: false,
        }
    }
}

impl Settings {
    /// The Redis key namespace prefix. Default `"bq"`.
    pub fn get_prefix(&self) -> &str {
        &self.prefix
    }

    /// The Redis connection URL. Default `"redis://127.0.0.1/"`.
    pub fn get_redis_url(&self) -> &str {
        &self.redis_url
    }

    /// Set the Redis connection URL (host/port, socket path, db index and
    /// auth are all expressed through the URL, as `redis::Client::open`
    /// expects).
    pub fn set_redis_url(mut self, redis_url: impl Into<String>) -> Self {
        self.redis_url = redis_url.into();
        self
    }

    /// Set the Redis key namespace prefix.
    pub fn set_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// The stall window length. Default 5000ms.
    pub fn get_stall_interval(&self) -> Duration {
        self.stall_interval
    }

    /// Set the stall window length.
    pub fn set_stall_interval(mut self, interval: Duration) -> Self {
        self.stall_interval = interval;
        self
    }

    /// Whether this queue opens a blocking-fetch connection and enables
    /// `process`. Default `true`.
    pub fn is_worker(&self) -> bool {
        self.is_worker
    }

    /// Set whether this queue acts as a worker.
    pub fn set_is_worker(mut self, is_worker: bool) -> Self {
        self.is_worker = is_worker;
        self
    }

    /// Whether this queue opens a subscriber connection and enables local
    /// event emission. Default `true`.
    pub fn get_events(&self) -> bool {
        self.get_events
    }

    /// Set whether this queue subscribes to the events channel.
    pub fn set_get_events(mut self, get_events: bool) -> Self {
        self.get_events = get_events;
        self
    }

    /// Whether a worker on this queue publishes events. Default `true`.
    pub fn send_events(&self) -> bool {
        self.send_events
    }

    /// Set whether this queue publishes events as a worker.
    pub fn set_send_events(mut self, send_events: bool) -> Self {
        self.send_events = send_events;
        self
    }

    /// Whether a successful job is purged from `jobs` rather than added to
    /// `succeeded`. Default `false`.
    pub fn remove_on_success(&self) -> bool {
        self.remove_on_success
    }

    /// Set whether successful jobs are purged instead of retained.
    pub fn set_remove_on_success(mut self, remove_on_success: bool) -> Self {
        self.remove_on_success = remove_on_success;
        self
    }

    /// Whether a panicking handler should be treated as `done(err)` rather
    /// than propagating. Default `false`.
    pub fn catch_exceptions(&self) -> bool {
        self.catch_exceptions
    }

    /// Set whether handler panics are caught and converted to failures.
    pub fn set_catch_exceptions(mut self, catch_exceptions: bool) -> Self {
        self.catch_exceptions = catch_exceptions;
        self
    }
}
