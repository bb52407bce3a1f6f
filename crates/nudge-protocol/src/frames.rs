use nudge_core::{ReminderRecord, ReminderSnapshot, ReminderStats, TriggerChoice};
use serde::{Deserialize, Serialize};

/// Client → daemon.
/// Wire: `{ "type": "addReminder", "text": "Stretch", "intervalMinutes": 20 }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Inbound {
    #[serde(rename_all = "camelCase")]
    AddReminder { text: String, interval_minutes: f64 },
    ToggleReminder { id: String },
    DeleteReminder { id: String },
    GetReminders,
    /// Answer to a `showNotification`. `choice` is null when the
    /// notification was closed without picking anything.
    #[serde(rename_all = "camelCase")]
    NotificationResponse {
        reminder_id: String,
        #[serde(default)]
        choice: Option<TriggerChoice>,
    },
}

/// Daemon → client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Outbound {
    /// Full list plus stats, sent on attach and after every change.
    UpdateReminders {
        reminders: Vec<ReminderRecord>,
        stats: ReminderStats,
    },
    /// Ask the client to render a fired reminder and answer with a
    /// `notificationResponse`.
    #[serde(rename_all = "camelCase")]
    ShowNotification {
        reminder_id: String,
        message: String,
        choices: Vec<TriggerChoice>,
    },
    /// Advisory only; the request that caused it had no effect.
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        message: String,
    },
}

impl Outbound {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Outbound::Error {
            code: Some(code.to_string()),
            message: message.into(),
        }
    }

    pub fn show_notification(
        reminder_id: impl Into<String>,
        message: impl Into<String>,
        choices: &[TriggerChoice],
    ) -> Self {
        Outbound::ShowNotification {
            reminder_id: reminder_id.into(),
            message: message.into(),
            choices: choices.to_vec(),
        }
    }
}

impl From<ReminderSnapshot> for Outbound {
    fn from(snapshot: ReminderSnapshot) -> Self {
        Outbound::UpdateReminders {
            reminders: snapshot.reminders,
            stats: snapshot.stats,
        }
    }
}
