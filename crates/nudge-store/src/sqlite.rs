use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use nudge_core::{decode_slot, ReminderRecord, StoredReminder};
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::{db::init_db, error::Result, store::ReminderStore};

/// Reminder list stored as a JSON blob in one `kv_slots` row.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    slot: String,
}

impl SqliteStore {
    /// Wrap `conn`, creating the schema if needed.
    pub fn new(conn: Connection, slot: impl Into<String>) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            slot: slot.into(),
        })
    }

    /// Raw JSON currently stored in the slot.
    pub fn raw(&self) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let value = conn
            .query_row(
                "SELECT value FROM kv_slots WHERE key = ?1",
                [&self.slot],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }
}

impl ReminderStore for SqliteStore {
    fn load(&self) -> Result<Vec<StoredReminder>> {
        match self.raw()? {
            Some(json) => Ok(decode_slot(&json)?),
            None => {
                debug!(slot = %self.slot, "slot is empty");
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, records: &[ReminderRecord]) -> Result<()> {
        let json = serde_json::to_string(records)?;
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "INSERT INTO kv_slots (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                            updated_at = excluded.updated_at",
            rusqlite::params![self.slot, json, now],
        )?;
        debug!(slot = %self.slot, count = records.len(), "reminders saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use nudge_core::{Reminder, ReminderState};

    fn store() -> SqliteStore {
        SqliteStore::new(Connection::open_in_memory().unwrap(), "reminders").unwrap()
    }

    #[test]
    fn empty_slot_loads_as_empty_list() {
        assert!(store().load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = store();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let mut paused = Reminder::new("Water plants", 60.0, now).unwrap();
        paused.pause();
        let active = Reminder::new("Stretch", 25.0, now).unwrap();
        let records = vec![ReminderRecord::from(&paused), ReminderRecord::from(&active)];

        store.save(&records).unwrap();
        store.save(&records).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].state, Some(ReminderState::Paused));
        assert_eq!(loaded[1].text, "Stretch");
    }

    #[test]
    fn slots_are_independent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn.execute(
            "INSERT INTO kv_slots (key, value, updated_at) VALUES ('other', '[1,2]', 'x')",
            [],
        )
        .unwrap();
        let store = SqliteStore::new(conn, "reminders").unwrap();
        assert!(store.load().unwrap().is_empty());
    }
}
