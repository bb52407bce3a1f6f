//! `nudge-scheduler`: one Tokio timer per active reminder.
//!
//! # Overview
//!
//! [`ReminderScheduler`] turns "this reminder is due at T" into a spawned
//! timer task and invokes a single injected [`TriggerCallback`] when the
//! timer elapses. Arming a reminder always cancels its previous timer first,
//! so there is never more than one outstanding timer per reminder id.
//!
//! | Trigger time      | Behaviour                                      |
//! |-------------------|------------------------------------------------|
//! | absent / paused   | nothing is armed                               |
//! | at or before now  | callback runs synchronously, no timer created  |
//! | in the future     | timer task sleeps, then fires the callback     |

pub mod clock;
pub mod error;
pub mod scheduler;

pub use clock::{Clock, SharedClock, SystemClock, TokioClock};
pub use error::TriggerError;
pub use scheduler::{ReminderScheduler, TriggerCallback};
