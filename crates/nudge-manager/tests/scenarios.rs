// End-to-end behavior of the reminder service: timers, notifications,
// persistence and listeners running together under virtual time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use nudge_core::{ReminderSnapshot, ReminderState, TriggerChoice};
use nudge_manager::{
    ManagerError, Notifier, NotifyError, ReminderService, ServiceHandle, ServiceSettings,
};
use nudge_scheduler::{SharedClock, TokioClock};
use nudge_store::{MemoryStore, ReminderStore, SqliteStore};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Answers every notification with `answer` after `delay`, or never when
/// `delay` is `None`.
struct ScriptedNotifier {
    answer: Option<TriggerChoice>,
    delay: Option<Duration>,
    shown: Mutex<Vec<String>>,
}

impl ScriptedNotifier {
    fn answering(answer: TriggerChoice, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            answer: Some(answer),
            delay: Some(delay),
            shown: Mutex::new(Vec::new()),
        })
    }

    fn silent() -> Arc<Self> {
        Arc::new(Self {
            answer: None,
            delay: None,
            shown: Mutex::new(Vec::new()),
        })
    }

    fn shown(&self) -> Vec<String> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for ScriptedNotifier {
    async fn present(
        &self,
        _reminder_id: &str,
        message: &str,
        choices: &[TriggerChoice],
    ) -> Result<Option<TriggerChoice>, NotifyError> {
        assert_eq!(choices, TriggerChoice::ALL);
        self.shown.lock().unwrap().push(message.to_string());
        match self.delay {
            Some(delay) => {
                tokio::time::sleep(delay).await;
                Ok(self.answer)
            }
            None => std::future::pending().await,
        }
    }
}

struct Running {
    handle: ServiceHandle,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    t0: DateTime<Utc>,
}

impl Running {
    async fn stop(self) {
        self.shutdown.send(true).unwrap();
        self.task.await.unwrap();
    }
}

fn start(store: Box<dyn ReminderStore>, notifier: Arc<ScriptedNotifier>) -> Running {
    let t0 = Utc::now().trunc_subsecs(3);
    let clock: SharedClock = Arc::new(TokioClock::starting_at(t0));
    let (service, handle) = ReminderService::new(
        store,
        clock,
        notifier,
        ServiceSettings {
            notification_timeout: Duration::from_secs(10),
        },
    );
    let (shutdown, rx) = watch::channel(false);
    let task = tokio::spawn(service.run(rx));
    Running {
        handle,
        shutdown,
        task,
        t0,
    }
}

async fn elapse(d: Duration) {
    tokio::time::sleep(d).await;
    tokio::task::yield_now().await;
}

fn assert_near(actual: Option<DateTime<Utc>>, expected: DateTime<Utc>) {
    let actual = actual.expect("trigger time set");
    assert!(
        actual >= expected && actual - expected < TimeDelta::seconds(1),
        "trigger {actual} not near {expected}"
    );
}

#[tokio::test(start_paused = true)]
async fn unanswered_notification_dismisses_and_rearms() {
    let notifier = ScriptedNotifier::silent();
    let svc = start(Box::new(MemoryStore::new()), notifier.clone());

    let r = svc.handle.add("Drink water", 0.5).await.unwrap();
    assert_near(r.next_trigger_time(), svc.t0 + TimeDelta::seconds(30));

    elapse(Duration::from_secs(31)).await;
    assert_eq!(notifier.shown(), vec!["Reminder: Drink water".to_string()]);

    elapse(Duration::from_secs(10)).await;
    let snapshot = svc.handle.snapshot().await.unwrap();
    let record = &snapshot.reminders[0];
    assert_eq!(record.state, ReminderState::Active);
    // Timed out at t0+40s, next trigger one interval after that.
    assert_near(record.next_trigger_time, svc.t0 + TimeDelta::seconds(70));

    elapse(Duration::from_secs(30)).await;
    assert_eq!(notifier.shown().len(), 2);
    svc.stop().await;
}

#[tokio::test(start_paused = true)]
async fn snooze_answer_defers_by_the_labelled_minutes() {
    let notifier = ScriptedNotifier::answering(TriggerChoice::Snooze, Duration::from_secs(2));
    let svc = start(Box::new(MemoryStore::new()), notifier.clone());

    svc.handle.add("Stretch", 1.0).await.unwrap();
    elapse(Duration::from_secs(63)).await;

    let snapshot = svc.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.reminders[0].state, ReminderState::Snoozed);
    assert_near(
        snapshot.reminders[0].next_trigger_time,
        svc.t0 + TimeDelta::seconds(62) + TimeDelta::minutes(5),
    );
    assert_eq!(snapshot.stats.snoozed, 1);

    // The snoozed trigger fires again once the deferral runs out.
    elapse(Duration::from_secs(5 * 60)).await;
    assert_eq!(notifier.shown().len(), 2);
    svc.stop().await;
}

#[tokio::test(start_paused = true)]
async fn pause_answer_stops_the_reminder() {
    let notifier = ScriptedNotifier::answering(TriggerChoice::Pause, Duration::from_secs(1));
    let svc = start(Box::new(MemoryStore::new()), notifier.clone());

    svc.handle.add("Stretch", 1.0).await.unwrap();
    elapse(Duration::from_secs(62)).await;

    let snapshot = svc.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.reminders[0].state, ReminderState::Paused);
    assert_eq!(snapshot.reminders[0].next_trigger_time, None);

    elapse(Duration::from_secs(600)).await;
    assert_eq!(notifier.shown().len(), 1);
    svc.stop().await;
}

#[tokio::test(start_paused = true)]
async fn deleting_during_notification_does_not_resurrect() {
    let notifier = ScriptedNotifier::answering(TriggerChoice::Snooze, Duration::from_secs(5));
    let svc = start(Box::new(MemoryStore::new()), notifier.clone());

    let r = svc.handle.add("Stretch", 1.0).await.unwrap();
    elapse(Duration::from_secs(61)).await;
    assert_eq!(notifier.shown().len(), 1);

    svc.handle.delete(r.id()).await.unwrap();
    elapse(Duration::from_secs(10)).await;

    let snapshot = svc.handle.snapshot().await.unwrap();
    assert!(snapshot.reminders.is_empty());
    assert_eq!(snapshot.stats.total, 0);
    svc.stop().await;
}

#[tokio::test(start_paused = true)]
async fn paused_before_firing_is_never_presented() {
    let notifier = ScriptedNotifier::silent();
    let svc = start(Box::new(MemoryStore::new()), notifier.clone());

    let r = svc.handle.add("Stretch", 1.0).await.unwrap();
    assert_eq!(svc.handle.toggle(r.id()).await.unwrap(), ReminderState::Paused);
    elapse(Duration::from_secs(120)).await;

    assert!(notifier.shown().is_empty());
    assert_eq!(svc.handle.toggle(r.id()).await.unwrap(), ReminderState::Active);
    svc.stop().await;
}

#[tokio::test(start_paused = true)]
async fn overdue_snooze_is_presented_on_startup() {
    let past = Utc::now().timestamp_millis() - 60_000;
    let json = format!(
        r#"[{{"id":"call","text":"Call back","intervalMinutes":30,"state":"snoozed","nextTriggerTime":{past},"createdAt":{past}}}]"#
    );
    let notifier = ScriptedNotifier::silent();
    let svc = start(Box::new(MemoryStore::with_json(json)), notifier.clone());

    elapse(Duration::from_millis(1)).await;
    assert_eq!(notifier.shown(), vec!["Reminder: Call back".to_string()]);
    svc.stop().await;
}

#[tokio::test(start_paused = true)]
async fn sqlite_state_survives_restart() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    let store = Arc::new(SqliteStore::new(conn, "reminders").unwrap());

    let first = start(Box::new(Arc::clone(&store)), ScriptedNotifier::silent());
    let a = first.handle.add("Stretch", 20.0).await.unwrap();
    let b = first.handle.add("Blink", 20.0).await.unwrap();
    first.handle.toggle(b.id()).await.unwrap();
    first.handle.snooze(a.id(), 3.0).await.unwrap();
    let before = first.handle.snapshot().await.unwrap();
    first.stop().await;

    let second = start(Box::new(Arc::clone(&store)), ScriptedNotifier::silent());
    let after = second.handle.snapshot().await.unwrap();
    assert_eq!(after, before);
    assert_eq!(after.stats.snoozed, 1);
    assert_eq!(after.stats.paused, 1);
    second.stop().await;
}

#[tokio::test(start_paused = true)]
async fn listeners_see_every_change_and_survive_a_panicking_peer() {
    let svc = start(Box::new(MemoryStore::new()), ScriptedNotifier::silent());
    let calls = Arc::new(AtomicUsize::new(0));
    let last_total = Arc::new(AtomicUsize::new(0));

    let _bad = svc
        .handle
        .subscribe(Arc::new(|_: &ReminderSnapshot| panic!("listener bug")))
        .await
        .unwrap();
    let (c, t) = (Arc::clone(&calls), Arc::clone(&last_total));
    let good = svc
        .handle
        .subscribe(Arc::new(move |s: &ReminderSnapshot| {
            c.fetch_add(1, Ordering::SeqCst);
            t.store(s.stats.total, Ordering::SeqCst);
        }))
        .await
        .unwrap();

    let r = svc.handle.add("Stretch", 20.0).await.unwrap();
    svc.handle.add("Blink", 20.0).await.unwrap();
    svc.handle.pause(r.id()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(last_total.load(Ordering::SeqCst), 2);

    good.unsubscribe();
    svc.handle.dismiss(r.id()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    svc.stop().await;
}

#[tokio::test(start_paused = true)]
async fn validation_and_lookup_errors_reach_the_caller() {
    let svc = start(Box::new(MemoryStore::new()), ScriptedNotifier::silent());

    assert_eq!(
        svc.handle.add("   ", 5.0).await.unwrap_err().code(),
        "EMPTY_TEXT"
    );
    assert_eq!(
        svc.handle.add("Stretch", -2.0).await.unwrap_err().code(),
        "INVALID_INTERVAL"
    );
    assert!(matches!(
        svc.handle.toggle("missing").await,
        Err(ManagerError::NotFound { .. })
    ));
    assert!(svc.handle.snapshot().await.unwrap().reminders.is_empty());
    svc.stop().await;
}

#[tokio::test(start_paused = true)]
async fn handle_reports_stopped_service() {
    let svc = start(Box::new(MemoryStore::new()), ScriptedNotifier::silent());
    let handle = svc.handle.clone();
    svc.stop().await;

    assert_eq!(
        handle.add("Stretch", 5.0).await.unwrap_err(),
        ManagerError::ServiceStopped
    );
}
