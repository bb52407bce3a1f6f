use nudge_core::ValidationError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ManagerError {
    /// The reminder (or snooze request) failed validation.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Reminder not found: {id}")]
    NotFound { id: String },

    /// The service task has stopped and can no longer take commands.
    #[error("Reminder service is not running")]
    ServiceStopped,
}

impl ManagerError {
    /// Short error code string sent to presentation clients.
    pub fn code(&self) -> &'static str {
        match self {
            ManagerError::Validation(e) => e.code(),
            ManagerError::NotFound { .. } => "NOT_FOUND",
            ManagerError::ServiceStopped => "SERVICE_STOPPED",
        }
    }
}

pub type Result<T> = std::result::Result<T, ManagerError>;
