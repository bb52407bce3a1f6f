//! The reminder entity and its lifecycle state machine.
//!
//! A reminder is always in exactly one [`ReminderState`]. The trigger time is
//! present for `Active` and `Snoozed` reminders and absent for `Paused` ones;
//! every transition below preserves that pairing.

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Snooze length used when the user picks "Snooze" without a duration.
pub const DEFAULT_SNOOZE_MINUTES: f64 = 5.0;

/// Lifecycle state of a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderState {
    /// Firing on its regular interval.
    Active,
    /// Not firing; no trigger time.
    Paused,
    /// Firing once after a short deferral, then back to the regular interval.
    Snoozed,
}

impl std::fmt::Display for ReminderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReminderState::Active => "active",
            ReminderState::Paused => "paused",
            ReminderState::Snoozed => "snoozed",
        };
        write!(f, "{s}")
    }
}

/// A user-defined periodic reminder.
///
/// Fields are private so the state/trigger-time pairing can only change
/// through the named transitions. Uniqueness of `id` is the owning
/// collection's job, not the entity's.
#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    id: String,
    text: String,
    interval_minutes: f64,
    state: ReminderState,
    next_trigger_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl Reminder {
    /// Create a validated, active reminder due one interval after `now`.
    pub fn new(
        text: impl Into<String>,
        interval_minutes: f64,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let mut reminder = Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            interval_minutes,
            state: ReminderState::Active,
            next_trigger_time: None,
            created_at: now.trunc_subsecs(3),
        };
        reminder.validate()?;
        reminder.next_trigger_time = Some(offset_minutes(now, interval_minutes));
        Ok(reminder)
    }

    /// Rebuild a reminder from persisted fields.
    ///
    /// The state/trigger pairing is repaired rather than rejected: a paused
    /// reminder drops any stale trigger time, and an active or snoozed one
    /// without a trigger time becomes due one interval after `now`.
    pub fn restore(
        id: String,
        text: String,
        interval_minutes: f64,
        state: ReminderState,
        next_trigger_time: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let mut reminder = Self {
            id,
            text,
            interval_minutes,
            state,
            next_trigger_time: next_trigger_time.map(|t| t.trunc_subsecs(3)),
            created_at: created_at.trunc_subsecs(3),
        };
        reminder.validate()?;

        match reminder.state {
            ReminderState::Paused => reminder.next_trigger_time = None,
            _ if reminder.next_trigger_time.is_none() => {
                reminder.next_trigger_time = Some(offset_minutes(now, interval_minutes));
            }
            _ => {}
        }
        Ok(reminder)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn interval_minutes(&self) -> f64 {
        self.interval_minutes
    }

    pub fn state(&self) -> ReminderState {
        self.state
    }

    pub fn next_trigger_time(&self) -> Option<DateTime<Utc>> {
        self.next_trigger_time
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// True for reminders that will fire: `Active` or `Snoozed`.
    pub fn is_active(&self) -> bool {
        matches!(self.state, ReminderState::Active | ReminderState::Snoozed)
    }

    pub fn is_paused(&self) -> bool {
        self.state == ReminderState::Paused
    }

    pub fn is_snoozed(&self) -> bool {
        self.state == ReminderState::Snoozed
    }

    /// Time left until the next trigger, clamped at zero. `None` when paused.
    pub fn time_until_trigger(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        self.next_trigger_time
            .map(|at| (at - now).max(TimeDelta::zero()))
    }

    /// True when the trigger time is at or before `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.next_trigger_time.is_some_and(|at| at <= now)
    }

    pub fn pause(&mut self) {
        if self.state == ReminderState::Paused {
            return;
        }
        self.state = ReminderState::Paused;
        self.next_trigger_time = None;
    }

    /// Reactivate a paused reminder. No-op in any other state.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        if self.state != ReminderState::Paused {
            return;
        }
        self.state = ReminderState::Active;
        self.next_trigger_time = Some(offset_minutes(now, self.interval_minutes));
    }

    /// Defer the next trigger by `minutes`. Allowed from every state,
    /// including `Paused`, which it reactivates.
    pub fn snooze(&mut self, minutes: f64, now: DateTime<Utc>) {
        self.state = ReminderState::Snoozed;
        self.next_trigger_time = Some(offset_minutes(now, minutes));
    }

    /// Back to the regular interval. Also the outcome of an unanswered trigger.
    pub fn dismiss(&mut self, now: DateTime<Utc>) {
        self.state = ReminderState::Active;
        self.next_trigger_time = Some(offset_minutes(now, self.interval_minutes));
    }

    /// Push the trigger one interval past `now` without changing state.
    pub fn reschedule(&mut self, now: DateTime<Utc>) {
        if self.is_active() {
            self.next_trigger_time = Some(offset_minutes(now, self.interval_minutes));
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.interval_minutes.is_finite() && self.interval_minutes > 0.0) {
            return Err(ValidationError::NonPositiveInterval);
        }
        if self.text.trim().is_empty() {
            return Err(ValidationError::EmptyText);
        }
        Ok(())
    }
}

/// `now + minutes`, at millisecond resolution so persisted values round-trip.
/// Saturates instead of overflowing for absurdly long intervals.
pub(crate) fn offset_minutes(now: DateTime<Utc>, minutes: f64) -> DateTime<Utc> {
    let millis = (minutes * 60_000.0).round() as i64;
    let delta = TimeDelta::try_milliseconds(millis).unwrap_or(TimeDelta::MAX);
    now.trunc_subsecs(3)
        .checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
