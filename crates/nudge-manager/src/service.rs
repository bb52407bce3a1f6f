use std::sync::Arc;
use std::time::Duration;

use nudge_core::config::NotificationConfig;
use nudge_core::{Reminder, ReminderSnapshot, ReminderState, TriggerChoice, DEFAULT_SNOOZE_MINUTES};
use nudge_scheduler::{SharedClock, TriggerCallback, TriggerError};
use nudge_store::ReminderStore;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::error::{ManagerError, Result};
use crate::listeners::{ChangeListener, Subscription};
use crate::manager::ReminderManager;
use crate::notify::{present_with_timeout, NotificationOutcome, Notifier};

const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceSettings {
    /// How long a presented notification may stay unanswered.
    pub notification_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from(&NotificationConfig::default())
    }
}

impl From<&NotificationConfig> for ServiceSettings {
    fn from(config: &NotificationConfig) -> Self {
        Self {
            notification_timeout: config.timeout(),
        }
    }
}

enum Command {
    Add {
        text: String,
        interval_minutes: f64,
        reply: oneshot::Sender<Result<Reminder>>,
    },
    Toggle {
        id: String,
        reply: oneshot::Sender<Result<ReminderState>>,
    },
    Delete {
        id: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Snooze {
        id: String,
        minutes: f64,
        reply: oneshot::Sender<Result<()>>,
    },
    Dismiss {
        id: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Pause {
        id: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Snapshot {
        reply: oneshot::Sender<ReminderSnapshot>,
    },
    Subscribe {
        listener: ChangeListener,
        reply: oneshot::Sender<Subscription>,
    },
}

/// Runs a [`ReminderManager`] on a single task.
///
/// User commands, timer firings and notification answers all arrive over
/// channels and are applied one at a time, so no manager operation ever
/// interleaves with another. The notification wait itself runs on its own
/// task; only its outcome comes back through the loop.
pub struct ReminderService {
    manager: ReminderManager,
    commands: mpsc::Receiver<Command>,
    fired: mpsc::UnboundedReceiver<Reminder>,
    outcomes_tx: mpsc::UnboundedSender<(String, NotificationOutcome)>,
    outcomes: mpsc::UnboundedReceiver<(String, NotificationOutcome)>,
    notifier: Arc<dyn Notifier>,
    settings: ServiceSettings,
}

impl ReminderService {
    /// Load the store and build the service with its handle.
    ///
    /// Must be called inside a Tokio runtime. Reminders that fire during the
    /// load are queued and presented once [`run`](Self::run) starts.
    pub fn new(
        store: Box<dyn ReminderStore>,
        clock: SharedClock,
        notifier: Arc<dyn Notifier>,
        settings: ServiceSettings,
    ) -> (Self, ServiceHandle) {
        let (fired_tx, fired) = mpsc::unbounded_channel::<Reminder>();
        let on_trigger: TriggerCallback = Arc::new(move |reminder: &Reminder| {
            fired_tx
                .send(reminder.clone())
                .map_err(|_| TriggerError::ReceiverClosed {
                    id: reminder.id().to_string(),
                })
        });

        let manager = ReminderManager::new(store, clock, on_trigger);
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (outcomes_tx, outcomes) = mpsc::unbounded_channel();

        let service = Self {
            manager,
            commands,
            fired,
            outcomes_tx,
            outcomes,
            notifier,
            settings,
        };
        (
            service,
            ServiceHandle {
                commands: commands_tx,
            },
        )
    }

    /// Main event loop. Runs until `shutdown` broadcasts `true` or every
    /// handle is dropped, then disposes the manager.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            reminders = self.manager.stats().total,
            "reminder service started"
        );
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("reminder service shutting down");
                        break;
                    }
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => {
                        info!("all service handles dropped, stopping");
                        break;
                    }
                },
                Some(reminder) = self.fired.recv() => self.on_fired(reminder),
                Some((id, outcome)) = self.outcomes.recv() => self.apply_outcome(&id, outcome),
            }
        }
        self.manager.dispose();
    }

    // --- private helpers ---------------------------------------------------

    fn handle(&mut self, command: Command) {
        // A dropped reply receiver only means the caller stopped waiting.
        match command {
            Command::Add {
                text,
                interval_minutes,
                reply,
            } => {
                let _ = reply.send(self.manager.add(&text, interval_minutes));
            }
            Command::Toggle { id, reply } => {
                let _ = reply.send(self.manager.toggle(&id));
            }
            Command::Delete { id, reply } => {
                let _ = reply.send(self.manager.delete(&id));
            }
            Command::Snooze { id, minutes, reply } => {
                let _ = reply.send(self.manager.snooze(&id, minutes));
            }
            Command::Dismiss { id, reply } => {
                let _ = reply.send(self.manager.dismiss(&id));
            }
            Command::Pause { id, reply } => {
                let _ = reply.send(self.manager.pause(&id));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.manager.snapshot());
            }
            Command::Subscribe { listener, reply } => {
                let _ = reply.send(self.manager.on_change(listener));
            }
        }
    }

    /// Present a fired reminder, unless it was paused or deleted after the
    /// timer had already committed to firing.
    fn on_fired(&mut self, fired: Reminder) {
        let Some(current) = self.manager.get(fired.id()) else {
            debug!(reminder_id = %fired.id(), "fired reminder no longer exists");
            return;
        };
        if !current.is_active() {
            debug!(reminder_id = %fired.id(), "fired reminder is paused, skipping");
            return;
        }

        info!(reminder_id = %fired.id(), "reminder triggered");
        let notifier = Arc::clone(&self.notifier);
        let outcomes = self.outcomes_tx.clone();
        let timeout = self.settings.notification_timeout;
        let id = current.id().to_string();
        let text = current.text().to_string();
        tokio::spawn(async move {
            let outcome = present_with_timeout(notifier.as_ref(), &id, &text, timeout).await;
            let _ = outcomes.send((id, outcome));
        });
    }

    fn apply_outcome(&mut self, id: &str, outcome: NotificationOutcome) {
        let choice = outcome.resolve();
        debug!(reminder_id = %id, ?outcome, %choice, "applying notification outcome");
        let result = match choice {
            TriggerChoice::Snooze => self.manager.snooze(id, DEFAULT_SNOOZE_MINUTES),
            TriggerChoice::Pause => self.manager.pause(id),
            TriggerChoice::Dismiss => self.manager.dismiss(id),
        };
        if let Err(e) = result {
            warn!(reminder_id = %id, error = %e, "notification outcome not applied");
        }
    }
}

/// Cloneable front door to a running [`ReminderService`].
///
/// Every call returns [`ManagerError::ServiceStopped`] once the service task
/// has exited.
#[derive(Clone)]
pub struct ServiceHandle {
    commands: mpsc::Sender<Command>,
}

impl ServiceHandle {
    pub async fn add(&self, text: impl Into<String>, interval_minutes: f64) -> Result<Reminder> {
        let text = text.into();
        self.request(|reply| Command::Add {
            text,
            interval_minutes,
            reply,
        })
        .await?
    }

    pub async fn toggle(&self, id: impl Into<String>) -> Result<ReminderState> {
        let id = id.into();
        self.request(|reply| Command::Toggle { id, reply }).await?
    }

    pub async fn delete(&self, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        self.request(|reply| Command::Delete { id, reply }).await?
    }

    pub async fn snooze(&self, id: impl Into<String>, minutes: f64) -> Result<()> {
        let id = id.into();
        self.request(|reply| Command::Snooze { id, minutes, reply }).await?
    }

    pub async fn dismiss(&self, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        self.request(|reply| Command::Dismiss { id, reply }).await?
    }

    pub async fn pause(&self, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        self.request(|reply| Command::Pause { id, reply }).await?
    }

    /// All reminders in insertion order, with their stats.
    pub async fn snapshot(&self) -> Result<ReminderSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Register a change listener. It runs on the service task, so it must
    /// not block.
    pub async fn subscribe(&self, listener: ChangeListener) -> Result<Subscription> {
        self.request(|reply| Command::Subscribe { listener, reply }).await
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| ManagerError::ServiceStopped)?;
        rx.await.map_err(|_| ManagerError::ServiceStopped)
    }
}
