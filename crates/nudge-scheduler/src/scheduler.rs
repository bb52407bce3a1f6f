use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use nudge_core::Reminder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::clock::SharedClock;
use crate::error::TriggerError;

/// Invoked once per firing with the reminder as it was when armed.
pub type TriggerCallback = Arc<dyn Fn(&Reminder) -> Result<(), TriggerError> + Send + Sync>;

/// Bookkeeping for one outstanding timer.
struct ArmedTimer {
    /// Distinguishes this arm from earlier ones for the same id.
    generation: u64,
    deadline: DateTime<Utc>,
    cancel: CancellationToken,
}

type TimerMap = Arc<Mutex<HashMap<String, ArmedTimer>>>;

/// Keeps at most one live timer per reminder id.
///
/// Timer tasks are spawned on the current Tokio runtime, so arming must
/// happen from within one. Dropping the scheduler cancels every timer.
pub struct ReminderScheduler {
    timers: TimerMap,
    next_generation: u64,
    on_trigger: TriggerCallback,
    clock: SharedClock,
}

impl ReminderScheduler {
    pub fn new(on_trigger: TriggerCallback, clock: SharedClock) -> Self {
        Self {
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_generation: 0,
            on_trigger,
            clock,
        }
    }

    /// Arm a timer for the reminder's next trigger time, replacing any
    /// existing one. An overdue reminder fires right here, synchronously.
    pub fn schedule(&mut self, reminder: &Reminder) {
        self.cancel(reminder.id());

        if !reminder.is_active() {
            debug!(reminder_id = %reminder.id(), "reminder is not active, skipping");
            return;
        }
        let Some(deadline) = reminder.next_trigger_time() else {
            debug!(reminder_id = %reminder.id(), "reminder has no trigger time, skipping");
            return;
        };

        let delay = deadline - self.clock.now();
        if delay <= TimeDelta::zero() {
            info!(reminder_id = %reminder.id(), "trigger time already passed, firing now");
            fire(&self.on_trigger, reminder);
            return;
        }
        let delay = delay.to_std().unwrap_or_default();

        self.next_generation += 1;
        let generation = self.next_generation;
        let cancel = CancellationToken::new();
        lock(&self.timers).insert(
            reminder.id().to_string(),
            ArmedTimer {
                generation,
                deadline,
                cancel: cancel.clone(),
            },
        );

        debug!(
            reminder_id = %reminder.id(),
            delay_ms = delay.as_millis() as u64,
            "timer armed"
        );

        let timers = Arc::clone(&self.timers);
        let on_trigger = Arc::clone(&self.on_trigger);
        let reminder = reminder.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            // Only the current arm may fire; a cancel or re-arm that raced
            // with the wake-up has already replaced or removed the entry.
            if !take_if_current(&timers, reminder.id(), generation) {
                return;
            }
            fire(&on_trigger, &reminder);
        });
    }

    /// Drop the reminder's timer, if any. Safe to call when none exists.
    pub fn cancel(&mut self, reminder_id: &str) {
        if let Some(timer) = lock(&self.timers).remove(reminder_id) {
            timer.cancel.cancel();
            debug!(reminder_id, "timer cancelled");
        }
    }

    /// Cancel then schedule.
    pub fn reschedule(&mut self, reminder: &Reminder) {
        self.cancel(reminder.id());
        self.schedule(reminder);
    }

    pub fn cancel_all(&mut self) {
        let drained: Vec<_> = lock(&self.timers).drain().collect();
        for (reminder_id, timer) in drained {
            timer.cancel.cancel();
            debug!(%reminder_id, "timer cancelled");
        }
    }

    /// Release every timer. Nothing armed before this call can fire after it.
    pub fn dispose(&mut self) {
        self.cancel_all();
    }

    pub fn active_timer_count(&self) -> usize {
        lock(&self.timers).len()
    }

    pub fn is_scheduled(&self, reminder_id: &str) -> bool {
        lock(&self.timers).contains_key(reminder_id)
    }

    /// Deadline of the outstanding timer for this reminder.
    pub fn scheduled_deadline(&self, reminder_id: &str) -> Option<DateTime<Utc>> {
        lock(&self.timers).get(reminder_id).map(|t| t.deadline)
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

// --- private helpers -------------------------------------------------------

fn lock(timers: &TimerMap) -> MutexGuard<'_, HashMap<String, ArmedTimer>> {
    timers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Remove the entry for `reminder_id` when it still belongs to `generation`.
fn take_if_current(timers: &TimerMap, reminder_id: &str, generation: u64) -> bool {
    let mut timers = lock(timers);
    match timers.get(reminder_id) {
        Some(timer) if timer.generation == generation => {
            timers.remove(reminder_id);
            true
        }
        _ => false,
    }
}

/// Run the callback, containing both returned errors and panics.
fn fire(on_trigger: &TriggerCallback, reminder: &Reminder) {
    match catch_unwind(AssertUnwindSafe(|| on_trigger(reminder))) {
        Ok(Ok(())) => debug!(reminder_id = %reminder.id(), "trigger delivered"),
        Ok(Err(e)) => error!(reminder_id = %reminder.id(), error = %e, "trigger callback failed"),
        Err(_) => error!(reminder_id = %reminder.id(), "trigger callback panicked"),
    }
}
