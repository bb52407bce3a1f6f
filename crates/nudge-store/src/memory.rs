use std::sync::{Mutex, PoisonError};

use nudge_core::{decode_slot, ReminderRecord, StoredReminder};

use crate::{error::Result, store::ReminderStore};

/// In-process slot. Used by tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the slot with raw JSON, e.g. a list in the legacy shape.
    pub fn with_json(json: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(json.into())),
            saves: Mutex::new(0),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ReminderStore for MemoryStore {
    fn load(&self) -> Result<Vec<StoredReminder>> {
        match self.raw() {
            Some(json) => Ok(decode_slot(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, records: &[ReminderRecord]) -> Result<()> {
        let json = serde_json::to_string(records)?;
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(json);
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}
