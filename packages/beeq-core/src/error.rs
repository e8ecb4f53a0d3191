use std::fmt;

/// The error type returned by every fallible `beeq` operation.
///
/// Mirrors the taxonomy in the queue's error handling design: transport
/// failures are retried at the connection level and re-surfaced, misuse
/// errors abort immediately, and handler errors are always resolved into a
/// terminal job disposition rather than propagated to the caller of
/// [`Queue::process`](../../beeq_redis/queue/struct.Queue.html#method.process).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A Redis connection, protocol, or script-loading failure. Boxed so that
    /// this crate stays free of a direct dependency on the `redis` crate;
    /// `beeq-redis` converts `redis::RedisError` into this variant at the
    /// boundary.
    #[error("transport error: {0}")]
    Transport(Box<dyn std::error::Error + Send + Sync + 'static>),

    /// The caller used the API in a way its contract forbids: calling
    /// `process` twice, calling `process` on a non-worker queue,
    /// `report_progress` outside a handler, or similar.
    #[error("misuse: {0}")]
    Misuse(String),

    /// An error reported by a job handler via its result, carried through to
    /// a `retrying` or `failed` disposition.
    #[error("handler error: {0}")]
    Handler(HandlerError),

    /// A job handler did not call its completion path within
    /// `options.timeout`.
    #[error("job timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A job handler panicked and `catch_exceptions` is enabled, so the
    /// panic was converted into a handler error instead of propagating.
    #[error("handler panicked: {0}")]
    HandlerPanic(String),

    /// Job data or event payload failed to serialize or deserialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a [`Error::Misuse`] from any displayable message.
    pub fn misuse(msg: impl fmt::Display) -> Self {
        Error::Misuse(msg.to_string())
    }

    /// Wrap a transport-level failure (a Redis error, typically) as an
    /// [`Error::Transport`].
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Transport(Box::new(err))
    }

    /// `true` if this is a [`Error::Timeout`], the one `HandlerError` kind
    /// consumers are expected to distinguish from ordinary handler failures.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}

/// A handler-reported error, as supplied to a job's completion path or
/// synthesized by the worker loop (timeout, panic).
///
/// Carries only a message and an optional stack, matching the JSON shape
/// published on the `events` channel: `{message, stack?}`. This runtime never
/// populates `stack` — see the Open Questions resolution in `DESIGN.md`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HandlerError {
    /// Human-readable error message, shown to consumers of `retrying`/`failed`
    /// events.
    pub message: String,
    /// Always `None` in this implementation; kept for wire compatibility with
    /// producers that might be written in a language that does emit stacks.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stack: Option<String>,
}

impl HandlerError {
    /// Construct a `HandlerError` carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        HandlerError {
            message: message.into(),
            stack: None,
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for HandlerError {}

impl From<HandlerError> for Error {
    fn from(err: HandlerError) -> Self {
        Error::Handler(err)
    }
}
