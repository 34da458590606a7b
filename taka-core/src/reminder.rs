//! One-shot local reminders ahead of a zone's next collection.
//!
//! A [`ReminderTask`] is armed for `occurrence - lead` and owns the timer that will
//! fire it. Cancellation always wins: the timer re-checks the task state under the
//! task lock before dispatching, so a task cancelled a moment before its timer
//! elapses never notifies.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeDelta};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::model::{Zone, ZoneId};
use crate::ports::{Notification, NotificationPermission, Notifier};

/// Default distance between the reminder and the collection it announces.
pub const DEFAULT_LEAD_HOURS: i64 = 24;

/// [`DEFAULT_LEAD_HOURS`] as a duration.
#[must_use]
pub fn default_lead() -> TimeDelta {
    TimeDelta::hours(DEFAULT_LEAD_HOURS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Lifecycle of a reminder task.
pub enum ReminderState {
    /// Created, no timer armed yet.
    Idle,
    /// Timer pending.
    Armed,
    /// Notification dispatched.
    Fired,
    /// Invalidated before firing.
    Cancelled,
    /// The lead window had already passed when arming; nothing will be sent.
    Skipped,
}

impl ReminderState {
    /// Fired, cancelled and skipped tasks never change again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ReminderState::Fired | ReminderState::Cancelled | ReminderState::Skipped
        )
    }
}

impl fmt::Display for ReminderState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReminderState::Idle => "idle",
            ReminderState::Armed => "armed",
            ReminderState::Fired => "sent",
            ReminderState::Cancelled => "cancelled",
            ReminderState::Skipped => "skipped (too late)",
        };
        formatter.write_str(label)
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Reasons a reminder cannot be armed.
pub enum ReminderError {
    /// Local notifications are not allowed; the user may grant them and retry.
    #[error("Notification permission {0}")]
    PermissionDenied(NotificationPermission),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Identifier of a reminder task, unique within a scheduler.
pub struct ReminderId(u64);

impl fmt::Display for ReminderId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct ReminderTarget {
    zone: ZoneId,
    zone_name: String,
    time_window: String,
}

impl From<&Zone> for ReminderTarget {
    fn from(zone: &Zone) -> Self {
        Self {
            zone: zone.id.clone(),
            zone_name: zone.name.clone(),
            time_window: zone.time_window.label().to_owned(),
        }
    }
}

#[derive(Debug)]
struct Timer {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl Timer {
    fn release(self) {
        self.token.cancel();
        self.task.abort();
    }
}

#[derive(Debug)]
struct TaskShared {
    id: ReminderId,
    target: ReminderTarget,
    occurrence: DateTime<FixedOffset>,
    lead: TimeDelta,
    due_at: DateTime<FixedOffset>,
    state: Mutex<ReminderState>,
    timer: Mutex<Option<Timer>>,
}

impl TaskShared {
    fn state(&self) -> MutexGuard<'_, ReminderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn timer(&self) -> MutexGuard<'_, Option<Timer>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Timer callback. Returns whether a notification was dispatched.
    ///
    /// Permission is read again under the state lock; a revoked permission cancels
    /// the task instead of firing it.
    fn fire(&self, notifier: &dyn Notifier) -> bool {
        let permission = {
            let mut state = self.state();
            if *state != ReminderState::Armed {
                debug!(reminder = %self.id, state = %state, "timer elapsed for inactive reminder");
                return false;
            }
            let permission = notifier.permission();
            *state = if permission == NotificationPermission::Granted {
                ReminderState::Fired
            } else {
                ReminderState::Cancelled
            };
            permission
        };
        *self.timer() = None;

        if permission != NotificationPermission::Granted {
            warn!(
                reminder = %self.id,
                %permission,
                "notification permission revoked, reminder cancelled"
            );
            return false;
        }

        info!(reminder = %self.id, zone = %self.target.zone, "dispatching collection reminder");
        notifier.dispatch(self.notification());
        true
    }

    /// Returns whether the task was armed and is now cancelled.
    fn cancel(&self) -> bool {
        {
            let mut state = self.state();
            if *state != ReminderState::Armed {
                return false;
            }
            *state = ReminderState::Cancelled;
        }
        if let Some(timer) = self.timer().take() {
            timer.release();
        }
        true
    }

    fn notification(&self) -> Notification {
        Notification {
            title: format!("Waste collection reminder: {}", self.target.zone_name),
            body: format!(
                "{} is collected on {}, {}.",
                self.target.zone_name,
                self.occurrence.format("%A %-d %B"),
                self.target.time_window
            ),
        }
    }
}

#[derive(Debug, Clone)]
/// Handle to one armed (or settled) reminder.
pub struct ReminderTask {
    shared: Arc<TaskShared>,
}

impl ReminderTask {
    /// Identifier within the scheduler that created the task.
    #[must_use]
    pub fn id(&self) -> ReminderId {
        self.shared.id
    }

    /// Zone the reminder announces.
    #[must_use]
    pub fn zone(&self) -> &ZoneId {
        &self.shared.target.zone
    }

    /// Display name of the zone.
    #[must_use]
    pub fn zone_name(&self) -> &str {
        &self.shared.target.zone_name
    }

    /// Collection instant being announced.
    #[must_use]
    pub fn occurrence(&self) -> DateTime<FixedOffset> {
        self.shared.occurrence
    }

    /// Distance between the reminder and the collection.
    #[must_use]
    pub fn lead(&self) -> TimeDelta {
        self.shared.lead
    }

    /// When the notification is (or was) due.
    #[must_use]
    pub fn due_at(&self) -> DateTime<FixedOffset> {
        self.shared.due_at
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ReminderState {
        *self.shared.state()
    }
}

/// Arms, cancels and re-arms reminder tasks. At most one task is active at a time.
pub struct ReminderScheduler {
    notifier: Arc<dyn Notifier>,
    active: Option<ReminderTask>,
    next_id: u64,
}

impl ReminderScheduler {
    /// Create a scheduler dispatching through `notifier`.
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            active: None,
            next_id: 1,
        }
    }

    /// The most recently armed task, whatever its state.
    #[must_use]
    pub fn active(&self) -> Option<&ReminderTask> {
        self.active.as_ref()
    }

    /// Arm a reminder for `occurrence - lead`.
    ///
    /// Any previously active task is cancelled first. When the due instant is not
    /// after `now` the returned task is [`ReminderState::Skipped`] and no timer is
    /// started. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ReminderError::PermissionDenied`] unless `permission` is granted; the
    /// currently active task is left untouched in that case.
    pub fn arm(
        &mut self,
        zone: &Zone,
        occurrence: DateTime<FixedOffset>,
        lead: TimeDelta,
        permission: NotificationPermission,
        now: DateTime<FixedOffset>,
    ) -> Result<ReminderTask, ReminderError> {
        self.arm_target(ReminderTarget::from(zone), occurrence, lead, permission, now)
    }

    /// Cancel `task` if it is still armed. Settled tasks are left alone.
    pub fn cancel(&mut self, task: &ReminderTask) {
        if task.shared.cancel() {
            info!(reminder = %task.id(), zone = %task.zone(), "reminder cancelled");
        } else {
            debug!(
                reminder = %task.id(),
                state = %task.state(),
                "cancel on settled reminder ignored"
            );
        }
    }

    /// Cancel the active task, if any.
    pub fn cancel_active(&mut self) {
        if let Some(task) = self.active.clone() {
            self.cancel(&task);
        }
    }

    /// Cancel `task` and arm a fresh one for the same zone and lead at `occurrence`.
    ///
    /// # Errors
    ///
    /// Same as [`ReminderScheduler::arm`]; `task` stays cancelled either way.
    pub fn reschedule(
        &mut self,
        task: &ReminderTask,
        occurrence: DateTime<FixedOffset>,
        permission: NotificationPermission,
        now: DateTime<FixedOffset>,
    ) -> Result<ReminderTask, ReminderError> {
        self.cancel(task);
        self.arm_target(
            task.shared.target.clone(),
            occurrence,
            task.lead(),
            permission,
            now,
        )
    }

    /// The selected zone changed: a reminder for any other zone is cancelled.
    pub fn zone_changed(&mut self, zone: &ZoneId) {
        if let Some(task) = self.active.clone()
            && task.zone() != zone
        {
            self.cancel(&task);
        }
    }

    /// The notification permission changed. Unless it is granted, an armed reminder
    /// is cancelled.
    pub fn permission_changed(&mut self, permission: NotificationPermission) {
        if permission == NotificationPermission::Granted {
            return;
        }
        if let Some(task) = self.active.clone()
            && task.shared.cancel()
        {
            info!(
                reminder = %task.id(),
                %permission,
                "notification permission revoked, reminder cancelled"
            );
        }
    }

    fn arm_target(
        &mut self,
        target: ReminderTarget,
        occurrence: DateTime<FixedOffset>,
        lead: TimeDelta,
        permission: NotificationPermission,
        now: DateTime<FixedOffset>,
    ) -> Result<ReminderTask, ReminderError> {
        if permission != NotificationPermission::Granted {
            warn!(
                zone = %target.zone,
                %permission,
                "reminder not armed without notification permission"
            );
            return Err(ReminderError::PermissionDenied(permission));
        }

        self.cancel_active();

        let id = ReminderId(self.next_id);
        self.next_id += 1;

        let due_at = occurrence.checked_sub_signed(lead).unwrap_or(occurrence);
        let task = ReminderTask {
            shared: Arc::new(TaskShared {
                id,
                target,
                occurrence,
                lead,
                due_at,
                state: Mutex::new(ReminderState::Idle),
                timer: Mutex::new(None),
            }),
        };

        if due_at <= now {
            *task.shared.state() = ReminderState::Skipped;
            info!(
                reminder = %id,
                zone = %task.zone(),
                %due_at,
                %now,
                "reminder window already passed, skipped"
            );
        } else {
            *task.shared.state() = ReminderState::Armed;
            let delay = (due_at - now).to_std().unwrap_or(Duration::ZERO);
            let timer = spawn_timer(
                Arc::downgrade(&task.shared),
                Arc::clone(&self.notifier),
                delay,
            );
            *task.shared.timer() = Some(timer);
            info!(reminder = %id, zone = %task.zone(), %due_at, ?delay, "reminder armed");
        }

        self.active = Some(task.clone());
        Ok(task)
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        self.cancel_active();
    }
}

fn spawn_timer(task: Weak<TaskShared>, notifier: Arc<dyn Notifier>, delay: Duration) -> Timer {
    let token = CancellationToken::new();
    let cancelled = token.clone();
    let deadline = Instant::now() + delay;

    let handle = tokio::spawn(async move {
        tokio::select! {
            () = cancelled.cancelled() => {}
            () = tokio::time::sleep_until(deadline) => {
                if let Some(task) = task.upgrade() {
                    task.fire(notifier.as_ref());
                }
            }
        }
    });

    Timer {
        token,
        task: handle,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use chrono::{DateTime, FixedOffset, TimeDelta, TimeZone};

    use super::{
        DEFAULT_LEAD_HOURS, ReminderError, ReminderScheduler, ReminderState, ReminderTask,
        default_lead,
    };
    use crate::model::{TimeWindow, WeekdaySet, Zone, ZoneId};
    use crate::ports::{Notification, NotificationPermission, Notifier};

    struct RecordingNotifier {
        permission: Mutex<NotificationPermission>,
        sent: Mutex<Vec<Notification>>,
    }

    impl RecordingNotifier {
        fn set_permission(&self, permission: NotificationPermission) {
            *self.permission.lock().expect("not poisoned") = permission;
        }
    }

    impl Notifier for RecordingNotifier {
        fn permission(&self) -> NotificationPermission {
            *self.permission.lock().expect("not poisoned")
        }

        fn request_permission(&self) -> NotificationPermission {
            self.permission()
        }

        fn dispatch(&self, notification: Notification) {
            self.sent.lock().expect("not poisoned").push(notification);
        }
    }

    struct TestContext {
        notifier: Arc<RecordingNotifier>,
        scheduler: ReminderScheduler,
        now: DateTime<FixedOffset>,
    }

    impl TestContext {
        fn new() -> Self {
            let notifier = Arc::new(RecordingNotifier {
                permission: Mutex::new(NotificationPermission::Granted),
                sent: Mutex::new(Vec::new()),
            });
            let port = Arc::clone(&notifier);
            let scheduler = ReminderScheduler::new(port);
            let now = FixedOffset::east_opt(3 * 3600)
                .expect("valid offset")
                .with_ymd_and_hms(2026, 10, 14, 9, 0, 0)
                .single()
                .expect("unambiguous");
            Self {
                notifier,
                scheduler,
                now,
            }
        }

        /// Arm a reminder for zone A with the default lead and granted permission.
        fn arm_in(&mut self, hours: i64) -> ReminderTask {
            let occurrence = self.now + TimeDelta::hours(hours);
            self.scheduler
                .arm(
                    &zone("A"),
                    occurrence,
                    default_lead(),
                    NotificationPermission::Granted,
                    self.now,
                )
                .expect("permission granted")
        }

        fn sent(&self) -> Vec<Notification> {
            self.notifier.sent.lock().expect("not poisoned").clone()
        }
    }

    fn zone(id: &str) -> Zone {
        Zone {
            id: ZoneId::from(id),
            name: format!("Zone {id}"),
            boundary: Vec::new(),
            areas: Vec::new(),
            collection_days: WeekdaySet::parse_names(["Monday", "Thursday"]).expect("valid names"),
            time_window: TimeWindow::new("6:00 AM - 10:00 AM"),
        }
    }

    async fn wait(delta: TimeDelta) {
        tokio::time::sleep(delta.to_std().expect("positive")).await;
    }

    #[tokio::test(start_paused = true)]
    async fn armed_reminder_fires_once_at_due_time() {
        let mut ctx = TestContext::new();
        let task = ctx.arm_in(25);
        assert_eq!(task.state(), ReminderState::Armed);
        assert_eq!(task.due_at(), ctx.now + TimeDelta::hours(1));

        wait(TimeDelta::minutes(59)).await;
        assert!(ctx.sent().is_empty(), "must not fire early");

        wait(TimeDelta::minutes(2)).await;
        assert_eq!(task.state(), ReminderState::Fired);
        let sent = ctx.sent();
        assert_eq!(sent.len(), 1);
        let notification = sent.first().expect("one notification");
        assert!(notification.title.contains("Zone A"));
        assert!(notification.body.contains("6:00 AM - 10:00 AM"));
        assert!(notification.body.contains("Thursday 15 October"));

        wait(TimeDelta::days(7)).await;
        assert_eq!(ctx.sent().len(), 1, "fires at most once");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_wins_over_the_timer() {
        let mut ctx = TestContext::new();
        let task = ctx.arm_in(25);

        ctx.scheduler.cancel(&task);
        assert_eq!(task.state(), ReminderState::Cancelled);

        // A callback that raced the cancellation must not dispatch.
        assert!(!task.shared.fire(ctx.notifier.as_ref()));

        wait(TimeDelta::hours(2)).await;
        assert!(ctx.sent().is_empty());
        assert!(task.shared.timer().is_none(), "timer released");
    }

    #[tokio::test(start_paused = true)]
    async fn permission_revoked_before_due_time_cancels_instead_of_firing() {
        let mut ctx = TestContext::new();
        let task = ctx.arm_in(25);

        ctx.notifier.set_permission(NotificationPermission::Denied);
        wait(TimeDelta::hours(2)).await;

        assert_eq!(task.state(), ReminderState::Cancelled);
        assert!(ctx.sent().is_empty());
        assert!(task.shared.timer().is_none(), "timer released");
    }

    #[tokio::test(start_paused = true)]
    async fn permission_change_cancels_the_armed_reminder() {
        let mut ctx = TestContext::new();
        let task = ctx.arm_in(30);

        ctx.scheduler.permission_changed(NotificationPermission::Granted);
        assert_eq!(task.state(), ReminderState::Armed);

        ctx.scheduler.permission_changed(NotificationPermission::Prompt);
        assert_eq!(task.state(), ReminderState::Cancelled);

        wait(TimeDelta::hours(8)).await;
        assert!(ctx.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn passed_lead_window_is_skipped() {
        let mut ctx = TestContext::new();
        for hours in [23, DEFAULT_LEAD_HOURS] {
            let task = ctx.arm_in(hours);
            assert_eq!(task.state(), ReminderState::Skipped);
        }

        wait(TimeDelta::days(3)).await;
        assert!(ctx.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn arming_requires_permission() {
        let mut ctx = TestContext::new();
        for permission in [NotificationPermission::Denied, NotificationPermission::Prompt] {
            let result = ctx.scheduler.arm(
                &zone("A"),
                ctx.now + TimeDelta::hours(30),
                default_lead(),
                permission,
                ctx.now,
            );
            assert_eq!(
                result.map(|task| task.state()),
                Err(ReminderError::PermissionDenied(permission))
            );
        }
        assert!(ctx.scheduler.active().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn denied_permission_keeps_the_active_reminder() {
        let mut ctx = TestContext::new();
        let task = ctx.arm_in(30);

        let denied = ctx.scheduler.arm(
            &zone("A"),
            ctx.now + TimeDelta::hours(40),
            default_lead(),
            NotificationPermission::Denied,
            ctx.now,
        );
        assert!(denied.is_err());
        assert_eq!(task.state(), ReminderState::Armed);
    }

    #[tokio::test(start_paused = true)]
    async fn new_arm_cancels_previous_task() {
        let mut ctx = TestContext::new();
        let first = ctx.arm_in(30);
        let second = ctx.arm_in(32);

        assert_eq!(first.state(), ReminderState::Cancelled);
        assert_eq!(second.state(), ReminderState::Armed);
        assert_ne!(first.id(), second.id());

        wait(TimeDelta::hours(9)).await;
        assert_eq!(ctx.sent().len(), 1);
        assert_eq!(second.state(), ReminderState::Fired);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent() {
        let mut ctx = TestContext::new();
        let task = ctx.arm_in(25);

        wait(TimeDelta::hours(2)).await;
        assert_eq!(task.state(), ReminderState::Fired);

        ctx.scheduler.cancel(&task);
        ctx.scheduler.cancel(&task);
        assert_eq!(task.state(), ReminderState::Fired);

        let skipped = ctx.arm_in(0);
        ctx.scheduler.cancel(&skipped);
        assert_eq!(skipped.state(), ReminderState::Skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_matches_cancel_then_arm() {
        for hours in [3, 24, 25, 60] {
            let mut rescheduled = TestContext::new();
            let original = rescheduled.arm_in(48);
            let target = rescheduled.now + TimeDelta::hours(hours);
            let via_reschedule = rescheduled
                .scheduler
                .reschedule(
                    &original,
                    target,
                    NotificationPermission::Granted,
                    rescheduled.now,
                )
                .expect("permission granted");

            let mut manual = TestContext::new();
            let first = manual.arm_in(48);
            manual.scheduler.cancel(&first);
            let via_arm = manual.arm_in(hours);

            assert_eq!(original.state(), first.state());
            assert_eq!(via_reschedule.state(), via_arm.state());
            assert_eq!(via_reschedule.due_at(), via_arm.due_at());
            assert_eq!(via_reschedule.zone(), via_arm.zone());
            assert_eq!(via_reschedule.lead(), via_arm.lead());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zone_change_cancels_reminder_for_other_zone() {
        let mut ctx = TestContext::new();
        let task = ctx.arm_in(30);

        ctx.scheduler.zone_changed(&ZoneId::from("A"));
        assert_eq!(task.state(), ReminderState::Armed);

        ctx.scheduler.zone_changed(&ZoneId::from("B"));
        assert_eq!(task.state(), ReminderState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_scheduler_ends_the_session() {
        let mut ctx = TestContext::new();
        let task = ctx.arm_in(30);
        let TestContext {
            notifier,
            scheduler,
            ..
        } = ctx;

        drop(scheduler);
        assert_eq!(task.state(), ReminderState::Cancelled);

        tokio::time::sleep(Duration::from_secs(60 * 60 * 24)).await;
        assert!(notifier.sent.lock().expect("not poisoned").is_empty());
    }
}
