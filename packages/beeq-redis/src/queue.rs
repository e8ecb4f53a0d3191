use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use beeq_core::error::{Error, HandlerError};
use beeq_core::event::QueueEvent;
use beeq_core::job::Job;
use beeq_core::schema::KeySchema;
use beeq_core::settings::Settings;
use futures::FutureExt;
use redis::aio::ConnectionManager;
use redis::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, watch, Semaphore};
use tokio::task::JoinHandle;

use crate::events::spawn_subscriber;
use crate::pending_job::PendingJob;
use crate::registry::Registry;
use crate::scripts::Scripts;
use crate::worker::spawn_fetch_loop;

/// A named handle over a group of Redis keys that can produce, consume, or
/// observe jobs.
///
/// Cloning a `Queue` is cheap: it shares the same connections, registry and
/// background tasks as the original, the way the teacher's `RedisStorage`
/// shares its `ConnectionManager` across clones.
pub struct Queue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Queue {
            inner: self.inner.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.inner.name)
            .field("settings", &self.inner.settings)
            .finish()
    }
}

pub(crate) struct Inner<T> {
    name: String,
    schema: KeySchema,
    settings: Settings,
    scripts: Scripts,
    client: Client,
    conn: ConnectionManager,
    registry: Registry,
    queue_events_tx: broadcast::Sender<QueueEvent<T>>,
    shutdown_tx: watch::Sender<bool>,
    process_started: AtomicBool,
    concurrency: OnceLock<u32>,
    semaphore: OnceLock<Arc<Semaphore>>,
    background: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<T> Queue<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Connect a new queue handle named `name`, opening the command
    /// connection unconditionally, the blocking-fetch connection only when
    /// `process` is later called, and the pub/sub subscriber only if
    /// `settings.get_events()` is set.
    ///
    /// Queue readiness is signaled (via a `Ready` event on [`Queue::events`])
    /// only once every atomic script has been loaded into Redis's script
    /// cache.
    pub async fn new(name: impl Into<String>, settings: Settings) -> Result<Self, Error> {
        let name = name.into();
        let schema = KeySchema::new(settings.get_prefix(), &name);

        let client = Client::open(settings.get_redis_url()).map_err(Error::transport)?;
        let mut conn = client
            .get_connection_manager()
            .await
            .map_err(Error::transport)?;

        let scripts = Scripts::new();
        scripts.warm(&mut conn).await?;

        let (queue_events_tx, _) = broadcast::channel(1024);
        let (shutdown_tx, _) = watch::channel(false);

        let inner = Arc::new(Inner {
            name,
            schema,
            settings,
            scripts,
            client,
            conn,
            registry: Registry::new(),
            queue_events_tx,
            shutdown_tx,
            process_started: AtomicBool::new(false),
            concurrency: OnceLock::new(),
            semaphore: OnceLock::new(),
            background: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });

        let queue = Queue { inner };

        if queue.inner.settings.get_events() {
            let handle = spawn_subscriber(queue.clone()).await?;
            queue.inner.background.lock().unwrap().push(handle);
        }

        let _ = queue.inner.queue_events_tx.send(QueueEvent::Ready);
        tracing::info!(queue = queue.name(), "queue ready");

        Ok(queue)
    }

    /// This queue's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Subscribe to queue-level events: `ready`, `error`, `succeeded`/
    /// `retrying`/`failed` for jobs this queue processed as a worker, and the
    /// `"job <event>"` fan-out for every job this queue observes (including
    /// ones processed elsewhere).
    pub fn events(&self) -> broadcast::Receiver<QueueEvent<T>> {
        self.inner.queue_events_tx.subscribe()
    }

    /// Build a new, unsaved job around `data`, defaulted to `retries = 0`
    /// and no timeout.
    pub fn create_job(&self, data: T) -> PendingJob<T> {
        PendingJob::new(self.clone(), data)
    }

    /// Look up a job by id. Returns `None` if the id was never saved, or was
    /// purged after success under `remove_on_success`.
    pub async fn get_job(&self, id: u64) -> Result<Option<Job<T>>, Error> {
        let mut conn = self.command_connection();
        let raw: Option<String> = redis::cmd("HGET")
            .arg(self.inner.schema.jobs())
            .arg(id)
            .query_async(&mut conn)
            .await
            .map_err(Error::transport)?;
        match raw {
            None => Ok(None),
            Some(raw) => {
                let record = serde_json::from_str(&raw)?;
                Ok(Some(Job::from_record(id, record)))
            }
        }
    }

    /// Scan for stalled jobs now, moving any still in `stalling` back to
    /// `waiting`, then snapshot the current `active` list into `stalling`.
    /// Returns the number of recovered ids.
    pub async fn check_stalled_jobs(&self) -> Result<u64, Error> {
        let mut conn = self.command_connection();
        self.inner
            .scripts
            .check_stalled(&mut conn, &self.inner.schema)
            .await
    }

    /// Begin consuming jobs with up to `concurrency` handler invocations in
    /// flight at once. May be called at most once per queue, and only on a
    /// queue created with `is_worker` enabled.
    pub async fn process<F, Fut>(&self, concurrency: usize, handler: F) -> Result<(), Error>
    where
        F: Fn(Job<T>, HandlerContext<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        if !self.inner.settings.is_worker() {
            return Err(Error::misuse("process called on a non-worker queue"));
        }
        if self.inner.process_started.swap(true, Ordering::SeqCst) {
            return Err(Error::misuse("process called more than once"));
        }
        let concurrency = concurrency.max(1) as u32;
        let semaphore = Arc::new(Semaphore::new(concurrency as usize));
        let _ = self.inner.semaphore.set(semaphore.clone());
        let _ = self.inner.concurrency.set(concurrency);

        let blocking_conn = self
            .inner
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(Error::transport)?;

        let fetch_handle = spawn_fetch_loop(self.clone(), blocking_conn, semaphore, Arc::new(handler));
        self.inner.background.lock().unwrap().push(fetch_handle);
        self.spawn_stall_supervisor();

        Ok(())
    }

    fn spawn_stall_supervisor(&self) {
        let queue = self.clone();
        let interval = self.inner.settings.get_stall_interval();
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        match queue.check_stalled_jobs().await {
                            Ok(0) => {}
                            Ok(n) => tracing::info!(queue = queue.name(), recovered = n, "recovered stalled jobs"),
                            Err(e) => {
                                tracing::warn!(queue = queue.name(), error = %e, "stall check failed");
                                let _ = queue.inner.queue_events_tx.send(QueueEvent::Error(e.to_string()));
                            }
                        }
                    }
                }
            }
        });
        self.inner.background.lock().unwrap().push(handle);
    }

    /// Stop issuing new fetches, await in-flight handlers (or their
    /// timeouts), unsubscribe, and drop every connection. Idempotent calls
    /// after the first fail with `Error::Misuse`.
    pub async fn close(&self) -> Result<(), Error> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Err(Error::misuse("queue already closed"));
        }

        let _ = self.inner.shutdown_tx.send(true);

        if let (Some(semaphore), Some(&concurrency)) =
            (self.inner.semaphore.get(), self.inner.concurrency.get())
        {
            let _ = semaphore.clone().acquire_many_owned(concurrency).await;
        }

        let handles: Vec<JoinHandle<()>> =
            std::mem::take(&mut *self.inner.background.lock().unwrap());
        for handle in handles {
            let _ = handle.await;
        }

        self.inner.registry.clear();
        tracing::info!(queue = self.name(), "queue closed");
        Ok(())
    }

    /// Get a clone of the command connection. `ConnectionManager` is cheap
    /// to clone and multiplexes over a single underlying socket, the same
    /// shape the teacher's `RedisStorage::get_connection` exposes.
    pub fn get_connection(&self) -> ConnectionManager {
        self.inner.conn.clone()
    }

    /// Get this queue's key schema.
    pub fn get_schema(&self) -> &KeySchema {
        &self.inner.schema
    }

    /// Get this queue's settings.
    pub fn get_settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn command_connection(&self) -> ConnectionManager {
        self.get_connection()
    }

    pub(crate) fn schema(&self) -> &KeySchema {
        self.get_schema()
    }

    pub(crate) fn settings(&self) -> &Settings {
        self.get_settings()
    }

    pub(crate) fn scripts(&self) -> &Scripts {
        &self.inner.scripts
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub(crate) fn queue_events(&self) -> &broadcast::Sender<QueueEvent<T>> {
        &self.inner.queue_events_tx
    }

    pub(crate) fn client(&self) -> &Client {
        &self.inner.client
    }

    pub(crate) fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.inner.shutdown_tx.subscribe()
    }
}

/// Passed to a job handler alongside its [`Job`]. The only way to report
/// progress, so `report_progress` being "valid only inside a handler" is
/// structural rather than a runtime check.
pub struct HandlerContext<T> {
    pub(crate) id: u64,
    pub(crate) queue: Queue<T>,
}

impl<T> std::fmt::Debug for HandlerContext<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext").field("id", &self.id).finish()
    }
}

impl<T> HandlerContext<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// The id of the job currently being handled.
    pub fn job_id(&self) -> u64 {
        self.id
    }

    /// Report progress for the job currently being handled. Fire-and-forget:
    /// delivery is best-effort, exactly like the rest of the pub/sub event
    /// bus. A no-op if this queue has `send_events` disabled.
    pub async fn report_progress(&self, n: u8) -> Result<(), Error> {
        if n > 100 {
            return Err(Error::misuse("progress must be an integer in [0, 100]"));
        }
        if !self.queue.inner.settings.send_events() {
            return Ok(());
        }
        let msg = beeq_core::event::EventMessage {
            event: beeq_core::event::EventKind::Progress,
            id: self.id,
            data: serde_json::json!(n),
        };
        let payload = serde_json::to_string(&msg)?;
        let mut conn = self.queue.command_connection();
        let _: i64 = redis::cmd("PUBLISH")
            .arg(self.queue.inner.schema.events())
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(Error::transport)?;
        Ok(())
    }
}

/// Catch a panicking handler future into a [`HandlerError`], used when
/// `catch_exceptions` is enabled. Mirrors the panic-downcasting the teacher's
/// `CatchPanicLayer` example performs.
pub(crate) async fn catch_exceptions<Fut>(fut: Fut) -> Result<Value, HandlerError>
where
    Fut: Future<Output = Result<Value, HandlerError>> + Send,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(HandlerError::new(panic_message(payload))),
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
