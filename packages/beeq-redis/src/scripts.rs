use beeq_core::error::Error;
use beeq_core::schema::KeySchema;
use redis::aio::ConnectionManager;
use redis::Script;

/// The three server-side atomic scripts every mutation to queue state goes
/// through, so that no partial transition is ever observable.
///
/// Each [`redis::Script`] already implements `EVALSHA`-with-fallback-to-`EVAL`
/// on `NOSCRIPT` internally; [`Scripts::warm`] additionally loads every
/// script explicitly so that queue readiness can be signaled only once all
/// three are cached, as the schema's contract requires.
#[derive(Clone)]
pub(crate) struct Scripts {
    add_job: Script,
    finish_job: Script,
    check_stalled: Script,
}

impl Scripts {
    pub(crate) fn new() -> Self {
        Scripts {
            add_job: Script::new(include_str!("../lua/add_job.lua")),
            finish_job: Script::new(include_str!("../lua/finish_job.lua")),
            check_stalled: Script::new(include_str!("../lua/check_stalled.lua")),
        }
    }

    /// Load all three scripts into Redis's script cache. Called once during
    /// `Queue::new` before the `Ready` event is emitted.
    pub(crate) async fn warm(&self, conn: &mut ConnectionManager) -> Result<(), Error> {
        self.add_job
            .prepare_invoke()
            .load_async(conn)
            .await
            .map_err(Error::transport)?;
        self.finish_job
            .prepare_invoke()
            .load_async(conn)
            .await
            .map_err(Error::transport)?;
        self.check_stalled
            .prepare_invoke()
            .load_async(conn)
            .await
            .map_err(Error::transport)?;
        Ok(())
    }

    pub(crate) async fn add_job(
        &self,
        conn: &mut ConnectionManager,
        schema: &KeySchema,
        record_json: &str,
    ) -> Result<u64, Error> {
        self.add_job
            .key(schema.id())
            .key(schema.jobs())
            .key(schema.waiting())
            .arg(record_json)
            .invoke_async(conn)
            .await
            .map_err(Error::transport)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn finish_job(
        &self,
        conn: &mut ConnectionManager,
        schema: &KeySchema,
        id: u64,
        outcome: &str,
        remove_on_success: bool,
        updated_record_json: &str,
        event_json: &str,
        send_events: bool,
    ) -> Result<(), Error> {
        let _: i64 = self
            .finish_job
            .key(schema.active())
            .key(schema.stalling())
            .key(schema.jobs())
            .key(schema.succeeded())
            .key(schema.failed())
            .key(schema.waiting())
            .key(schema.events())
            .arg(id)
            .arg(outcome)
            .arg(if remove_on_success { "1" } else { "0" })
            .arg(updated_record_json)
            .arg(event_json)
            .arg(if send_events { "1" } else { "0" })
            .invoke_async(conn)
            .await
            .map_err(Error::transport)?;
        Ok(())
    }

    pub(crate) async fn check_stalled(
        &self,
        conn: &mut ConnectionManager,
        schema: &KeySchema,
    ) -> Result<u64, Error> {
        self.check_stalled
            .key(schema.stalling())
            .key(schema.active())
            .key(schema.waiting())
            .invoke_async(conn)
            .await
            .map_err(Error::transport)
    }
}
