use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use nudge_core::TriggerChoice;
use nudge_manager::{Notifier, NotifyError};
use nudge_protocol::Outbound;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

type Pending = HashMap<String, (u64, oneshot::Sender<Option<TriggerChoice>>)>;

/// Renders notifications as `showNotification` messages and waits for the
/// client's matching `notificationResponse`.
pub struct StdioNotifier {
    out: mpsc::UnboundedSender<Outbound>,
    pending: Mutex<Pending>,
    next_seq: Mutex<u64>,
}

impl StdioNotifier {
    pub fn new(out: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            out,
            pending: Mutex::new(HashMap::new()),
            next_seq: Mutex::new(0),
        }
    }

    /// Deliver a client answer. Returns false when nothing was waiting, e.g.
    /// the notification already timed out.
    pub fn resolve(&self, reminder_id: &str, choice: Option<TriggerChoice>) -> bool {
        match self.lock().remove(reminder_id) {
            Some((_, reply)) => reply.send(choice).is_ok(),
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Notifier for StdioNotifier {
    async fn present(
        &self,
        reminder_id: &str,
        message: &str,
        choices: &[TriggerChoice],
    ) -> Result<Option<TriggerChoice>, NotifyError> {
        let seq = {
            let mut next = self.next_seq.lock().unwrap_or_else(PoisonError::into_inner);
            *next += 1;
            *next
        };
        let (reply, answer) = oneshot::channel();
        if self
            .lock()
            .insert(reminder_id.to_string(), (seq, reply))
            .is_some()
        {
            debug!(reminder_id, "superseding an unanswered notification");
        }
        // Removes our entry however this future ends, timeout included.
        let _guard = PendingGuard {
            notifier: self,
            reminder_id,
            seq,
        };

        self.out
            .send(Outbound::show_notification(reminder_id, message, choices))
            .map_err(|_| NotifyError::Unavailable("client output closed".into()))?;

        answer
            .await
            .map_err(|_| NotifyError::Failed("notification superseded".into()))
    }
}

struct PendingGuard<'a> {
    notifier: &'a StdioNotifier,
    reminder_id: &'a str,
    seq: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.notifier.lock();
        if pending
            .get(self.reminder_id)
            .is_some_and(|(seq, _)| *seq == self.seq)
        {
            pending.remove(self.reminder_id);
        }
    }
}
