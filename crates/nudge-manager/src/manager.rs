use std::collections::HashMap;

use nudge_core::{
    Reminder, ReminderRecord, ReminderSnapshot, ReminderState, ReminderStats, ValidationError,
};
use nudge_scheduler::{ReminderScheduler, SharedClock, TriggerCallback};
use nudge_store::ReminderStore;
use tracing::{debug, error, info, warn};

use crate::error::{ManagerError, Result};
use crate::listeners::{ChangeListener, ListenerRegistry, Subscription};

/// Owns the reminder collection and is the only thing that mutates it.
///
/// Every mutation runs to completion in one call: entity transition,
/// scheduler update, persist, then listeners. Persistence failures are
/// logged and do not fail the operation; the in-memory state stays
/// authoritative for the running session.
pub struct ReminderManager {
    reminders: HashMap<String, Reminder>,
    /// Insertion order, for stable snapshots.
    order: Vec<String>,
    scheduler: ReminderScheduler,
    store: Box<dyn ReminderStore>,
    listeners: ListenerRegistry,
    clock: SharedClock,
}

impl ReminderManager {
    /// Build a manager and reconcile whatever the store holds.
    ///
    /// Must be called inside a Tokio runtime: reconciled reminders are armed
    /// immediately, and overdue snoozed ones fire through `on_trigger` before
    /// this returns.
    pub fn new(
        store: Box<dyn ReminderStore>,
        clock: SharedClock,
        on_trigger: TriggerCallback,
    ) -> Self {
        let scheduler = ReminderScheduler::new(on_trigger, clock.clone());
        let mut manager = Self {
            reminders: HashMap::new(),
            order: Vec::new(),
            scheduler,
            store,
            listeners: ListenerRegistry::default(),
            clock,
        };
        manager.load();
        manager
    }

    /// Validate and insert a new active reminder.
    pub fn add(&mut self, text: &str, interval_minutes: f64) -> Result<Reminder> {
        let now = self.clock.now();
        let mut reminder = Reminder::new(text, interval_minutes, now).map_err(|e| {
            warn!(error = %e, "rejected new reminder");
            ManagerError::from(e)
        })?;
        reminder.reschedule(now);

        let id = reminder.id().to_string();
        self.order.push(id.clone());
        self.reminders.insert(id.clone(), reminder.clone());
        self.scheduler.schedule(&reminder);
        info!(reminder_id = %id, interval_minutes, "reminder added");

        self.persist();
        self.notify_change();
        Ok(reminder)
    }

    pub fn get(&self, id: &str) -> Option<&Reminder> {
        self.reminders.get(id)
    }

    /// Snapshot in insertion order.
    pub fn get_all(&self) -> Vec<Reminder> {
        self.iter().cloned().collect()
    }

    /// Cancel the timer, then remove the reminder.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        if !self.reminders.contains_key(id) {
            return Err(not_found(id));
        }
        self.scheduler.cancel(id);
        self.reminders.remove(id);
        self.order.retain(|existing| existing != id);
        info!(reminder_id = %id, "reminder deleted");

        self.persist();
        self.notify_change();
        Ok(())
    }

    /// Resume a paused reminder, pause anything else. Returns the new state.
    pub fn toggle(&mut self, id: &str) -> Result<ReminderState> {
        let now = self.clock.now();
        let reminder = self.reminders.get_mut(id).ok_or_else(|| not_found(id))?;

        if reminder.is_paused() {
            reminder.resume(now);
            self.scheduler.schedule(reminder);
        } else {
            reminder.pause();
            self.scheduler.cancel(id);
        }
        let state = reminder.state();
        info!(reminder_id = %id, %state, "reminder toggled");

        self.persist();
        self.notify_change();
        Ok(state)
    }

    pub fn snooze(&mut self, id: &str, minutes: f64) -> Result<()> {
        if !(minutes.is_finite() && minutes > 0.0) {
            return Err(ValidationError::NonPositiveSnooze.into());
        }
        let now = self.clock.now();
        let reminder = self.reminders.get_mut(id).ok_or_else(|| not_found(id))?;
        reminder.snooze(minutes, now);
        self.scheduler.reschedule(reminder);
        info!(reminder_id = %id, minutes, "reminder snoozed");

        self.persist();
        self.notify_change();
        Ok(())
    }

    pub fn dismiss(&mut self, id: &str) -> Result<()> {
        let now = self.clock.now();
        let reminder = self.reminders.get_mut(id).ok_or_else(|| not_found(id))?;
        reminder.dismiss(now);
        self.scheduler.reschedule(reminder);
        info!(reminder_id = %id, "reminder dismissed");

        self.persist();
        self.notify_change();
        Ok(())
    }

    pub fn pause(&mut self, id: &str) -> Result<()> {
        let reminder = self.reminders.get_mut(id).ok_or_else(|| not_found(id))?;
        reminder.pause();
        self.scheduler.cancel(id);
        info!(reminder_id = %id, "reminder paused");

        self.persist();
        self.notify_change();
        Ok(())
    }

    /// Register a listener called after every successful mutation.
    pub fn on_change(&mut self, listener: ChangeListener) -> Subscription {
        self.listeners.register(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Counts per state over the whole collection.
    pub fn stats(&self) -> ReminderStats {
        ReminderStats::tally(self.iter())
    }

    pub fn snapshot(&self) -> ReminderSnapshot {
        ReminderSnapshot::from_reminders(self.iter())
    }

    pub fn scheduler(&self) -> &ReminderScheduler {
        &self.scheduler
    }

    /// Cancel all timers and drop all listeners.
    pub fn dispose(&mut self) {
        self.scheduler.dispose();
        self.listeners.clear();
        info!("reminder manager disposed");
    }

    // --- private helpers ---------------------------------------------------

    fn iter(&self) -> impl Iterator<Item = &Reminder> + Clone + '_ {
        self.order.iter().filter_map(|id| self.reminders.get(id))
    }

    /// Rebuild the collection from storage, migrate legacy records, repair
    /// missed triggers, arm timers, and write the result back.
    fn load(&mut self) {
        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                error!(error = %e, "failed to load reminders, starting empty");
                return;
            }
        };
        if stored.is_empty() {
            info!("no saved reminders found");
            return;
        }

        let now = self.clock.now();
        let mut migrated = 0usize;
        for record in stored {
            if record.is_legacy() {
                migrated += 1;
            }
            let mut reminder = match record.into_reminder(now) {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "skipping invalid stored reminder");
                    continue;
                }
            };
            if self.reminders.contains_key(reminder.id()) {
                warn!(reminder_id = %reminder.id(), "skipping duplicate stored reminder");
                continue;
            }

            // Missed while not running: push regular reminders forward, but
            // let overdue snoozes fire straight away.
            if reminder.is_active() && reminder.is_overdue(now) && !reminder.is_snoozed() {
                debug!(reminder_id = %reminder.id(), "rescheduling missed trigger");
                reminder.reschedule(now);
            }

            let id = reminder.id().to_string();
            self.order.push(id.clone());
            self.reminders.insert(id, reminder.clone());
            self.scheduler.schedule(&reminder);
        }

        if migrated > 0 {
            info!(count = migrated, "migrated legacy reminder records");
        }
        self.persist();
        info!(count = self.reminders.len(), "reminders loaded");
    }

    fn persist(&self) {
        let records: Vec<ReminderRecord> = self.iter().map(ReminderRecord::from).collect();
        if let Err(e) = self.store.save(&records) {
            error!(error = %e, "failed to save reminders");
        }
    }

    fn notify_change(&self) {
        self.listeners.notify(&self.snapshot());
    }
}

fn not_found(id: &str) -> ManagerError {
    warn!(reminder_id = %id, "reminder not found");
    ManagerError::NotFound { id: id.to_string() }
}
