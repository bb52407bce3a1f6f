use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use nudge_core::ReminderSnapshot;
use tracing::{debug, error};

/// Called after every successful mutation with the resulting snapshot.
pub type ChangeListener = Arc<dyn Fn(&ReminderSnapshot) + Send + Sync>;

type Entries = RwLock<Vec<(u64, ChangeListener)>>;

/// Registry of change listeners, in registration order.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    entries: Arc<Entries>,
    next_id: u64,
}

impl ListenerRegistry {
    pub(crate) fn register(&mut self, listener: ChangeListener) -> Subscription {
        self.next_id += 1;
        let id = self.next_id;
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        debug!(listener_id = id, "change listener registered");
        Subscription {
            id,
            entries: Arc::downgrade(&self.entries),
        }
    }

    /// Call every listener. A panicking listener is logged and skipped; the
    /// rest still run.
    pub(crate) fn notify(&self, snapshot: &ReminderSnapshot) {
        // Clone out so a listener that unsubscribes does not deadlock.
        let listeners: Vec<_> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (id, listener) in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(snapshot))).is_err() {
                error!(listener_id = id, "change listener panicked");
            }
        }
    }

    pub(crate) fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Handle returned by `on_change`. Dropping it unregisters the listener.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    id: u64,
    entries: Weak<Entries>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }

    /// Keep the listener registered for as long as the registry lives.
    pub fn detach(mut self) {
        self.entries = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(entries) = self.entries.upgrade() {
            entries
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
            debug!(listener_id = self.id, "change listener removed");
        }
    }
}
