//! Persisted reminder shapes.
//!
//! [`ReminderRecord`] is the canonical on-disk form. [`StoredReminder`] is
//! what gets read back: it accepts both the canonical form and the older
//! flag-based shape (`isActive` / `isSnoozed`), which is migrated on load.

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::reminder::{Reminder, ReminderState};

/// Canonical persisted form. Timestamps are epoch milliseconds on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRecord {
    pub id: String,
    pub text: String,
    pub interval_minutes: f64,
    pub state: ReminderState,
    #[serde(
        default,
        serialize_with = "chrono::serde::ts_milliseconds_option::serialize",
        deserialize_with = "epoch_millis::deserialize_option"
    )]
    pub next_trigger_time: Option<DateTime<Utc>>,
    #[serde(
        serialize_with = "chrono::serde::ts_milliseconds::serialize",
        deserialize_with = "epoch_millis::deserialize"
    )]
    pub created_at: DateTime<Utc>,
}

impl From<&Reminder> for ReminderRecord {
    fn from(r: &Reminder) -> Self {
        Self {
            id: r.id().to_string(),
            text: r.text().to_string(),
            interval_minutes: r.interval_minutes(),
            state: r.state(),
            next_trigger_time: r.next_trigger_time(),
            created_at: r.created_at(),
        }
    }
}

impl ReminderRecord {
    /// Rebuild the entity. `now` is only used to repair a missing trigger time.
    pub fn into_reminder(self, now: DateTime<Utc>) -> Result<Reminder, ValidationError> {
        Reminder::restore(
            self.id,
            self.text,
            self.interval_minutes,
            self.state,
            self.next_trigger_time,
            self.created_at,
            now,
        )
    }
}

/// A record as read from storage, in either the canonical or the legacy shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReminder {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    pub interval_minutes: f64,
    #[serde(default)]
    pub state: Option<ReminderState>,
    /// Legacy flag, superseded by `state`. The outer `Option` records
    /// whether the key was present at all, even with a null value.
    #[serde(default, deserialize_with = "present")]
    pub is_active: Option<Option<bool>>,
    /// Legacy flag, superseded by `state`.
    #[serde(default, deserialize_with = "present")]
    pub is_snoozed: Option<Option<bool>>,
    #[serde(default, deserialize_with = "epoch_millis::deserialize_option")]
    pub next_trigger_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "epoch_millis::deserialize_option")]
    pub created_at: Option<DateTime<Utc>>,
}

impl StoredReminder {
    /// True when the record carries either boolean flag key.
    pub fn is_legacy(&self) -> bool {
        self.is_active.is_some() || self.is_snoozed.is_some()
    }

    /// State after migration: snoozed wins over active, anything else
    /// (false, null) is paused.
    pub fn resolved_state(&self) -> ReminderState {
        if self.is_legacy() {
            if self.is_snoozed.flatten().unwrap_or(false) {
                ReminderState::Snoozed
            } else if self.is_active.flatten().unwrap_or(false) {
                ReminderState::Active
            } else {
                ReminderState::Paused
            }
        } else {
            self.state.unwrap_or(ReminderState::Active)
        }
    }

    /// Migrate and validate. Missing ids and creation times are filled in.
    pub fn into_reminder(self, now: DateTime<Utc>) -> Result<Reminder, ValidationError> {
        let state = self.resolved_state();
        Reminder::restore(
            self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            self.text,
            self.interval_minutes,
            state,
            self.next_trigger_time,
            self.created_at.unwrap_or(now),
            now,
        )
    }
}

impl From<ReminderRecord> for StoredReminder {
    fn from(r: ReminderRecord) -> Self {
        Self {
            id: Some(r.id),
            text: r.text,
            interval_minutes: r.interval_minutes,
            state: Some(r.state),
            is_active: None,
            is_snoozed: None,
            next_trigger_time: r.next_trigger_time,
            created_at: Some(r.created_at),
        }
    }
}

fn present<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Option<bool>>, D::Error> {
    Option::<bool>::deserialize(d).map(Some)
}

/// Epoch-millisecond timestamps that may have been written as fractional
/// numbers (`Date.now() + minutes * 60000` with fractional minutes). Values
/// are rounded to the nearest millisecond.
mod epoch_millis {
    use super::*;

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        from_millis(f64::deserialize(d)?)
    }

    pub(super) fn deserialize_option<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<f64>::deserialize(d)?.map(from_millis).transpose()
    }

    fn from_millis<E: de::Error>(ms: f64) -> Result<DateTime<Utc>, E> {
        if !ms.is_finite() {
            return Err(E::custom(format!("timestamp is not finite: {ms}")));
        }
        DateTime::from_timestamp_millis(ms.round() as i64)
            .ok_or_else(|| E::custom(format!("timestamp out of range: {ms}")))
    }
}

/// Decode a storage slot holding a JSON list of records.
///
/// The list itself must parse; individual elements that do not are skipped
/// with a warning so one corrupt entry cannot take the rest down with it.
pub fn decode_slot(json: &str) -> Result<Vec<StoredReminder>, serde_json::Error> {
    let items: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let records = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(index, error = %e, "skipping undecodable reminder record");
                None
            }
        })
        .collect();
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn record_survives_json_and_rebuilds_equal_entity() {
        let mut original = Reminder::new("Stand up", 45.0, t0()).unwrap();
        original.snooze(5.0, t0() + TimeDelta::milliseconds(1234));

        let json = serde_json::to_string(&ReminderRecord::from(&original)).unwrap();
        let stored: StoredReminder = serde_json::from_str(&json).unwrap();
        let rebuilt = stored.into_reminder(t0() + TimeDelta::days(1)).unwrap();

        assert_eq!(rebuilt, original);
    }

    #[test]
    fn canonical_wire_shape() {
        let r = Reminder::new("Stand up", 45.0, t0()).unwrap();
        let value = serde_json::to_value(ReminderRecord::from(&r)).unwrap();
        assert_eq!(value["intervalMinutes"], 45.0);
        assert_eq!(value["state"], "active");
        assert_eq!(value["createdAt"], t0().timestamp_millis());
        assert_eq!(
            value["nextTriggerTime"],
            (t0() + TimeDelta::minutes(45)).timestamp_millis()
        );
    }

    #[test]
    fn legacy_inactive_record_migrates_to_paused() {
        let json = r#"{"id":"1700000000000","text":"Blink","intervalMinutes":20,
                       "isActive":false,"isSnoozed":false,"nextTriggerTime":null}"#;
        let stored: StoredReminder = serde_json::from_str(json).unwrap();
        assert!(stored.is_legacy());
        let r = stored.into_reminder(t0()).unwrap();
        assert_eq!(r.state(), ReminderState::Paused);
        assert_eq!(r.next_trigger_time(), None);
        assert_eq!(r.id(), "1700000000000");
        assert_eq!(r.created_at(), t0());
    }

    #[test]
    fn legacy_snoozed_flag_wins_over_active() {
        let json = r#"{"id":"a","text":"Blink","intervalMinutes":20,
                       "isActive":true,"isSnoozed":true,"nextTriggerTime":1772355600000}"#;
        let stored: StoredReminder = serde_json::from_str(json).unwrap();
        assert_eq!(stored.resolved_state(), ReminderState::Snoozed);
    }

    #[test]
    fn legacy_active_record_migrates_to_active() {
        let json = r#"{"id":"a","text":"Blink","intervalMinutes":20,"isActive":true}"#;
        let stored: StoredReminder = serde_json::from_str(json).unwrap();
        let r = stored.into_reminder(t0()).unwrap();
        assert_eq!(r.state(), ReminderState::Active);
        assert_eq!(r.next_trigger_time(), Some(t0() + TimeDelta::minutes(20)));
    }

    #[test]
    fn record_without_state_defaults_to_active() {
        let json = r#"{"id":"a","text":"Blink","intervalMinutes":1}"#;
        let stored: StoredReminder = serde_json::from_str(json).unwrap();
        assert!(!stored.is_legacy());
        assert_eq!(stored.resolved_state(), ReminderState::Active);
    }

    #[test]
    fn invalid_stored_record_is_rejected() {
        let json = r#"{"id":"a","text":"","intervalMinutes":1,"state":"active"}"#;
        let stored: StoredReminder = serde_json::from_str(json).unwrap();
        assert_eq!(
            stored.into_reminder(t0()).unwrap_err(),
            ValidationError::EmptyText
        );
    }

    #[test]
    fn decode_slot_skips_bad_elements() {
        let json = r#"[{"id":"a","text":"ok","intervalMinutes":1},
                       {"id":"b","intervalMinutes":"soon"},
                       {"id":"c","text":"also ok","intervalMinutes":2,"state":"paused"}]"#;
        let records = decode_slot(json).unwrap();
        let ids: Vec<_> = records.iter().filter_map(|r| r.id.as_deref()).collect();
        assert_eq!(ids, ["a", "c"]);
    }

    #[test]
    fn fractional_timestamps_round_to_milliseconds() {
        let json = r#"[{"id":"1700000000000","text":"Blink","intervalMinutes":1.23456,
                        "isActive":true,"isSnoozed":false,"nextTriggerTime":1772355674073.6}]"#;
        let records = decode_slot(json).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].next_trigger_time.map(|t| t.timestamp_millis()),
            Some(1772355674074)
        );

        let canonical = r#"{"id":"a","text":"Blink","intervalMinutes":0.7,"state":"snoozed",
                            "nextTriggerTime":1772355674073.4,"createdAt":1772355600000.5}"#;
        let record: ReminderRecord = serde_json::from_str(canonical).unwrap();
        assert_eq!(record.next_trigger_time.unwrap().timestamp_millis(), 1772355674073);
        assert_eq!(record.created_at.timestamp_millis(), 1772355600001);
    }

    #[test]
    fn out_of_range_timestamp_skips_only_that_record() {
        let json = r#"[{"id":"a","text":"ok","intervalMinutes":1,"nextTriggerTime":1e300},
                       {"id":"b","text":"ok","intervalMinutes":1,"nextTriggerTime":1772355600000}]"#;
        let records = decode_slot(json).unwrap();
        let ids: Vec<_> = records.iter().filter_map(|r| r.id.as_deref()).collect();
        assert_eq!(ids, ["b"]);
    }

    #[test]
    fn legacy_null_flags_migrate_to_paused() {
        let json = r#"{"id":"a","text":"Blink","intervalMinutes":20,
                       "isActive":null,"isSnoozed":null,"nextTriggerTime":1772355600000}"#;
        let stored: StoredReminder = serde_json::from_str(json).unwrap();
        assert!(stored.is_legacy());
        let r = stored.into_reminder(t0()).unwrap();
        assert_eq!(r.state(), ReminderState::Paused);
        assert_eq!(r.next_trigger_time(), None);
    }

    #[test]
    fn decode_slot_rejects_non_list() {
        assert!(decode_slot(r#"{"reminders":[]}"#).is_err());
    }
}
