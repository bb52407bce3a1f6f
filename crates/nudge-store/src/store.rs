use std::sync::Arc;

use nudge_core::{ReminderRecord, StoredReminder};

use crate::error::Result;

/// Synchronous persistence capability injected into the manager.
///
/// `load` returns records in either the canonical or the legacy shape;
/// migration is the caller's job. An empty or missing slot loads as an
/// empty list.
pub trait ReminderStore: Send + Sync {
    fn load(&self) -> Result<Vec<StoredReminder>>;

    fn save(&self, records: &[ReminderRecord]) -> Result<()>;
}

impl<S: ReminderStore + ?Sized> ReminderStore for Arc<S> {
    fn load(&self) -> Result<Vec<StoredReminder>> {
        (**self).load()
    }

    fn save(&self, records: &[ReminderRecord]) -> Result<()> {
        (**self).save(records)
    }
}
