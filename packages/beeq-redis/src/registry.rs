use std::collections::HashMap;
use std::sync::Mutex;

use beeq_core::event::JobEvent;
use tokio::sync::mpsc;

/// The in-process id -> handle map described in the producer path: populated
/// on `save` when `get_events` is enabled, consulted by the subscriber loop
/// to route inbound events, and drained on terminal events or `close`.
pub(crate) struct Registry {
    handles: Mutex<HashMap<u64, mpsc::UnboundedSender<JobEvent>>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Registry {
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn insert(&self, id: u64) -> mpsc::UnboundedReceiver<JobEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.handles.lock().unwrap().insert(id, tx);
        rx
    }

    /// Route an event to the handle registered for `id`, if any. Returns
    /// `true` if a handle was found (whether or not the send succeeded,
    /// since a dropped receiver simply means nobody is listening anymore).
    pub(crate) fn route(&self, id: u64, event: JobEvent) -> bool {
        let handles = self.handles.lock().unwrap();
        match handles.get(&id) {
            Some(tx) => {
                let _ = tx.send(event);
                true
            }
            None => false,
        }
    }

    /// Remove the handle for `id`. Called after a terminal event
    /// (`succeeded`/`failed`) and from `close`.
    pub(crate) fn remove(&self, id: u64) {
        self.handles.lock().unwrap().remove(&id);
    }

    pub(crate) fn clear(&self) {
        self.handles.lock().unwrap().clear();
    }
}
