use thiserror::Error;

/// Reasons a reminder is rejected before it can enter the collection.
///
/// The `Display` text is shown to users as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Reminder text cannot be empty.")]
    EmptyText,

    #[error("Interval must be greater than zero.")]
    NonPositiveInterval,

    #[error("Snooze duration must be greater than zero.")]
    NonPositiveSnooze,
}

impl ValidationError {
    /// Short error code string sent to presentation clients.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::EmptyText => "EMPTY_TEXT",
            ValidationError::NonPositiveInterval => "INVALID_INTERVAL",
            ValidationError::NonPositiveSnooze => "INVALID_SNOOZE",
        }
    }
}

#[derive(Debug, Error)]
pub enum NudgeError {
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, NudgeError>;
