use thiserror::Error;

/// Failures raised by a trigger callback.
///
/// The scheduler logs these and carries on; they never escape the firing path.
#[derive(Debug, Error)]
pub enum TriggerError {
    /// The side that handles fired reminders has gone away.
    #[error("trigger receiver closed for reminder {id}")]
    ReceiverClosed { id: String },

    /// The handler ran but could not process the reminder.
    #[error("trigger handler failed: {0}")]
    Handler(String),
}
