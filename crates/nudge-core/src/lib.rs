//! `nudge-core`: reminder entity, persisted record shapes, and shared config.
//!
//! Nothing in this crate knows about timers or storage backends. Every
//! transition on [`reminder::Reminder`] takes the current instant explicitly,
//! which keeps the state machine pure and lets callers pick their own clock.

pub mod config;
pub mod error;
pub mod record;
pub mod reminder;
pub mod types;

pub use error::{NudgeError, Result, ValidationError};
pub use record::{decode_slot, ReminderRecord, StoredReminder};
pub use reminder::{Reminder, ReminderState, DEFAULT_SNOOZE_MINUTES};
pub use types::{ReminderSnapshot, ReminderStats, TriggerChoice};
