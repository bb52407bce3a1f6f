use serde::{Deserialize, Serialize};

use crate::record::ReminderRecord;
use crate::reminder::{Reminder, ReminderState, DEFAULT_SNOOZE_MINUTES};

/// Per-state counts over the whole collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderStats {
    pub total: usize,
    pub active: usize,
    pub paused: usize,
    pub snoozed: usize,
}

impl ReminderStats {
    /// Tally every reminder. Each one lands in exactly one bucket.
    pub fn tally<'a>(reminders: impl IntoIterator<Item = &'a Reminder>) -> Self {
        let mut stats = Self::default();
        for reminder in reminders {
            stats.total += 1;
            match reminder.state() {
                ReminderState::Active => stats.active += 1,
                ReminderState::Paused => stats.paused += 1,
                ReminderState::Snoozed => stats.snoozed += 1,
            }
        }
        stats
    }
}

/// Read-only view handed to the presentation layer after every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderSnapshot {
    pub reminders: Vec<ReminderRecord>,
    pub stats: ReminderStats,
}

impl ReminderSnapshot {
    pub fn from_reminders<'a>(reminders: impl IntoIterator<Item = &'a Reminder> + Clone) -> Self {
        Self {
            reminders: reminders.clone().into_iter().map(ReminderRecord::from).collect(),
            stats: ReminderStats::tally(reminders),
        }
    }
}

/// A user's answer to a fired reminder. Serialized as the button label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerChoice {
    #[serde(rename = "Dismiss")]
    Dismiss,
    #[serde(rename = "Pause")]
    Pause,
    #[serde(rename = "Snooze (5 min)")]
    Snooze,
}

impl TriggerChoice {
    /// All choices in the order they are offered.
    pub const ALL: [TriggerChoice; 3] = [
        TriggerChoice::Dismiss,
        TriggerChoice::Pause,
        TriggerChoice::Snooze,
    ];

    /// Button text. The snooze label names [`DEFAULT_SNOOZE_MINUTES`], which
    /// is the length a Snooze answer applies.
    pub fn label(&self) -> &'static str {
        match self {
            TriggerChoice::Dismiss => "Dismiss",
            TriggerChoice::Pause => "Pause",
            TriggerChoice::Snooze => "Snooze (5 min)",
        }
    }
}

impl std::fmt::Display for TriggerChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
