use std::sync::Arc;

use nudge_manager::ServiceHandle;
use nudge_protocol::{decode_line, Inbound, Outbound, ProtocolError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::notifier::StdioNotifier;

/// Routes decoded client messages to the reminder service.
///
/// Failures never end the session: they go back to the client as an
/// advisory `error` message.
pub struct Dispatcher {
    handle: ServiceHandle,
    notifier: Arc<StdioNotifier>,
    out: mpsc::UnboundedSender<Outbound>,
}

impl Dispatcher {
    pub fn new(
        handle: ServiceHandle,
        notifier: Arc<StdioNotifier>,
        out: mpsc::UnboundedSender<Outbound>,
    ) -> Self {
        Self {
            handle,
            notifier,
            out,
        }
    }

    pub async fn dispatch_line(&self, line: &str) {
        match decode_line(line) {
            Ok(message) => self.dispatch(message).await,
            Err(ProtocolError::Empty) => {}
            Err(e) => {
                warn!(error = %e, "rejected client message");
                self.send(Outbound::error(e.code(), e.to_string()));
            }
        }
    }

    pub async fn dispatch(&self, message: Inbound) {
        let result = match message {
            Inbound::AddReminder {
                text,
                interval_minutes,
            } => self.handle.add(text, interval_minutes).await.map(|_| ()),
            Inbound::ToggleReminder { id } => self.handle.toggle(id).await.map(|_| ()),
            Inbound::DeleteReminder { id } => self.handle.delete(id).await,
            Inbound::GetReminders => self
                .handle
                .snapshot()
                .await
                .map(|snapshot| self.send(snapshot.into())),
            Inbound::NotificationResponse {
                reminder_id,
                choice,
            } => {
                if !self.notifier.resolve(&reminder_id, choice) {
                    debug!(%reminder_id, "no notification waiting for this response");
                }
                Ok(())
            }
        };

        if let Err(e) = result {
            self.send(Outbound::error(e.code(), e.to_string()));
        }
    }

    fn send(&self, message: Outbound) {
        if self.out.send(message).is_err() {
            debug!("client output closed, dropping message");
        }
    }
}
