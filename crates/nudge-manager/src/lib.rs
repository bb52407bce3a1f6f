//! `nudge-manager`: owns the reminder collection and drives it.
//!
//! [`ReminderManager`] is the only thing that mutates reminders. Every
//! operation runs the same sequence: entity transition, scheduler update,
//! persist, notify listeners. [`ReminderService`] wraps a manager in a single
//! Tokio task that interleaves user commands, timer firings and notification
//! answers one at a time.

pub mod error;
pub mod listeners;
pub mod manager;
pub mod notify;
pub mod service;

pub use error::{ManagerError, Result};
pub use listeners::{ChangeListener, Subscription};
pub use manager::ReminderManager;
pub use notify::{present_with_timeout, NotificationOutcome, Notifier, NotifyError};
pub use service::{ReminderService, ServiceHandle, ServiceSettings};
