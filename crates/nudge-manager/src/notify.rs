//! Host notification boundary.
//!
//! A [`Notifier`] shows a fired reminder with its choices and waits for the
//! user. [`present_with_timeout`] races that wait against a fixed timeout and
//! returns a tagged [`NotificationOutcome`].

use std::time::Duration;

use async_trait::async_trait;
use nudge_core::TriggerChoice;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum NotifyError {
    /// The host cannot display notifications right now.
    #[error("notification host unavailable: {0}")]
    Unavailable(String),

    #[error("notification failed: {0}")]
    Failed(String),
}

/// Capability for presenting a reminder to the user.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Show `message` with `choices` and wait for an answer.
    ///
    /// `Ok(None)` means the notification was closed without a choice. The
    /// future may be dropped at any point when the caller's timeout elapses.
    async fn present(
        &self,
        reminder_id: &str,
        message: &str,
        choices: &[TriggerChoice],
    ) -> Result<Option<TriggerChoice>, NotifyError>;
}

/// What came back from a presented notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    Choice(TriggerChoice),
    /// Closed without picking anything, or the host failed.
    NoSelection,
    TimedOut,
}

impl NotificationOutcome {
    /// The choice to apply. Anything but an explicit answer counts as dismiss.
    pub fn resolve(self) -> TriggerChoice {
        match self {
            NotificationOutcome::Choice(choice) => choice,
            NotificationOutcome::NoSelection | NotificationOutcome::TimedOut => {
                TriggerChoice::Dismiss
            }
        }
    }
}

/// Present `"Reminder: <text>"` and wait at most `timeout` for an answer.
pub async fn present_with_timeout(
    notifier: &dyn Notifier,
    reminder_id: &str,
    text: &str,
    timeout: Duration,
) -> NotificationOutcome {
    let message = format!("Reminder: {text}");
    match tokio::time::timeout(
        timeout,
        notifier.present(reminder_id, &message, &TriggerChoice::ALL),
    )
    .await
    {
        Ok(Ok(Some(choice))) => {
            info!(reminder_id, %choice, "notification answered");
            NotificationOutcome::Choice(choice)
        }
        Ok(Ok(None)) => {
            info!(reminder_id, "notification closed without a choice");
            NotificationOutcome::NoSelection
        }
        Ok(Err(e)) => {
            warn!(reminder_id, error = %e, "notification failed");
            NotificationOutcome::NoSelection
        }
        Err(_) => {
            info!(
                reminder_id,
                timeout_ms = timeout.as_millis() as u64,
                "notification timed out"
            );
            NotificationOutcome::TimedOut
        }
    }
}
