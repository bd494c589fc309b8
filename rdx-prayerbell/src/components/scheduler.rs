//! Writes the desired notification set into the OS store.
//!
//! A pass is all-or-nothing at the top level and best-effort per item: if the
//! scheduled set cannot be listed the pass aborts and the previous schedule
//! stays in place, but a single rejected item is logged and skipped.

use crate::common::{notification_id, reminder_id, ItemKind, RepeatFrequency, VibrationMode};
use crate::components::reconciler::{reconcile, reconcile_channels, ChannelPlan};
use crate::config::ChannelConfig;
use crate::error::{PrayerBellError, Result};
use crate::model::{
    DesiredItem, DesiredState, NotificationAction, NotificationItem, NotificationMetadata, Trigger,
};
use crate::platform::{ChannelRole, Labels, NotificationStore, PermissionProvider};
use crate::time::{compute_trigger, Clock};
use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Why a pass did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingUpstreamData,
    PermissionDenied,
}

/// The result of one [`Scheduler::sync`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Another pass was already in flight; this one was dropped.
    Busy,
    Skipped(SkipReason),
    /// Nothing had drifted. `cancelled` counts stale entries removed anyway.
    UpToDate { cancelled: usize },
    /// The managed set was rewritten.
    Rescheduled {
        scheduled: usize,
        failed: usize,
        cancelled: usize,
    },
}

impl SyncOutcome {
    /// Number of notifications created by this pass.
    pub fn scheduled_count(&self) -> usize {
        match self {
            SyncOutcome::Rescheduled { scheduled, .. } => *scheduled,
            _ => 0,
        }
    }
}

/// Clears the in-flight flag when a pass ends, however it ends.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Creates, cancels and replaces notifications in the OS store.
pub struct Scheduler {
    store: Arc<dyn NotificationStore>,
    permissions: Arc<dyn PermissionProvider>,
    labels: Arc<dyn Labels>,
    clock: Arc<dyn Clock>,
    channels: ChannelConfig,
    default_snooze_minutes: u32,
    in_flight: AtomicBool,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        permissions: Arc<dyn PermissionProvider>,
        labels: Arc<dyn Labels>,
        clock: Arc<dyn Clock>,
        channels: ChannelConfig,
        default_snooze_minutes: u32,
    ) -> Self {
        Self {
            store,
            permissions,
            labels,
            clock,
            channels,
            default_snooze_minutes,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Brings the OS store in line with `desired`.
    ///
    /// Returns [`SyncOutcome::Busy`] immediately if another pass is running;
    /// the caller's later input changes will trigger a fresh pass.
    pub async fn sync(&self, desired: &DesiredState) -> Result<SyncOutcome> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            debug!("sync already in flight, dropping this pass");
            return Ok(SyncOutcome::Busy);
        }
        let _guard = PassGuard(&self.in_flight);

        if let Err(e) = desired.ensure_times() {
            debug!("{e}, skipping sync");
            return Ok(SyncOutcome::Skipped(SkipReason::MissingUpstreamData));
        }
        match self.require_notifications().await {
            Ok(()) => {}
            Err(e @ PrayerBellError::PermissionDenied(_)) => {
                info!("{e}, skipping sync");
                return Ok(SyncOutcome::Skipped(SkipReason::PermissionDenied));
            }
            Err(e) => return Err(e),
        }

        let scheduled = self.store.scheduled().await.map_err(|e| {
            error!("cannot list scheduled notifications: {e}");
            PrayerBellError::Platform(e)
        })?;

        let now = self.clock.now();
        let plan = reconcile(desired, &scheduled, &now);
        let live: Vec<NotificationItem> = scheduled
            .iter()
            .filter(|item| !plan.stale.contains(&item.id))
            .cloned()
            .collect();
        let mode = desired.global.vibration;
        let channels = self.channel_plan(mode, &live).await;

        let mut cancelled = 0;
        for id in &plan.stale {
            if self.cancel(id).await {
                cancelled += 1;
            }
        }

        if !plan.resync && channels.is_clean() {
            debug!(cancelled, "schedule up to date");
            return Ok(SyncOutcome::UpToDate { cancelled });
        }
        info!(drift = ?plan.drift, channel_drift = ?channels.drift, "schedule drifted, rewriting");

        let mut moving = Vec::new();
        for item in live.into_iter().filter(|item| {
            item.kind().is_managed() || channels.rehome.contains(&item.id)
        }) {
            if !self.cancel(&item.id).await {
                continue;
            }
            if item.kind().is_managed() {
                cancelled += 1;
            } else {
                moving.push(item);
            }
        }

        self.apply_channels(&channels, mode, &desired.language).await;
        let exact = self.exact_alarms_allowed().await;

        let mut count = 0;
        let mut failed = 0;
        for item in desired.items().iter().filter(|item| item.is_enabled()) {
            let Some(time) = item.time else {
                debug!(name = item.name, "no time for today");
                continue;
            };
            let Some(trigger) = compute_trigger(time, item.settings.offset_minutes, &now) else {
                warn!(
                    "{}, skipping {}",
                    PrayerBellError::InvalidTimeFormat(time.to_string()),
                    item.name
                );
                continue;
            };

            let notification = self.build_item(item, desired, trigger, exact);
            let id = notification.id.clone();
            match self.store.schedule(notification).await {
                Ok(()) => {
                    debug!(%id, at = %trigger, "scheduled");
                    count += 1;
                }
                Err(source) => {
                    warn!("{}", PrayerBellError::SchedulingFailure { id, source });
                    failed += 1;
                }
            }
        }

        let moved = self.rehome_reminders(moving, mode).await;

        info!(scheduled = count, failed, cancelled, moved, "sync pass complete");
        Ok(SyncOutcome::Rescheduled {
            scheduled: count,
            failed,
            cancelled,
        })
    }

    /// Schedules the single follow-up reminder for a snoozed notification.
    ///
    /// A pending reminder for the same item is replaced, so only the latest
    /// snooze fires. Returns the new reminder's id.
    pub async fn schedule_snooze(&self, source: &NotificationMetadata) -> Result<String> {
        let now = self.clock.now();
        let minutes = if source.snooze_minutes == 0 {
            self.default_snooze_minutes
        } else {
            source.snooze_minutes
        };
        let fire_at = now + Duration::minutes(i64::from(minutes));

        match self.store.scheduled().await {
            Ok(pending) => {
                for earlier in pending
                    .iter()
                    .filter(|p| p.kind() == ItemKind::Reminder && p.metadata.name == source.name)
                {
                    debug!(id = %earlier.id, "replacing earlier snooze");
                    self.cancel(&earlier.id).await;
                }
            }
            Err(e) => warn!("cannot list pending reminders: {e}"),
        }

        let channel_id = self.reminder_channel(source.vibration, &source.language).await;
        let exact = self.exact_alarms_allowed().await;

        let metadata = NotificationMetadata {
            kind: ItemKind::Reminder,
            snooze_minutes: minutes,
            ..source.clone()
        };
        let id = reminder_id(&source.name, now.timestamp_millis());
        let reminder = NotificationItem {
            id: id.clone(),
            label: self.labels.tr(&source.name, &source.language),
            body: self.labels.tr("body.reminder", &source.language),
            channel_id,
            trigger: Trigger {
                timestamp_ms: fire_at.timestamp_millis(),
                repeat: RepeatFrequency::None,
                exact,
            },
            actions: NotificationAction::for_kind(ItemKind::Reminder),
            metadata,
        };

        self.store.schedule(reminder).await.map_err(|source| {
            PrayerBellError::SchedulingFailure {
                id: id.clone(),
                source,
            }
        })?;
        info!(%id, at = %fire_at, "snooze reminder scheduled");
        Ok(id)
    }

    fn build_item(
        &self,
        item: &DesiredItem<'_>,
        desired: &DesiredState,
        trigger: DateTime<Tz>,
        exact: bool,
    ) -> NotificationItem {
        let language = &desired.language;
        NotificationItem {
            id: notification_id(item.kind, item.name),
            label: self.labels.tr(item.name, language),
            body: self.labels.tr(&format!("body.{}", item.kind), language),
            channel_id: self.channel_for(item.kind, desired.global.vibration),
            trigger: Trigger {
                timestamp_ms: trigger.timestamp_millis(),
                repeat: RepeatFrequency::Daily,
                exact,
            },
            actions: NotificationAction::for_kind(item.kind),
            metadata: NotificationMetadata {
                kind: item.kind,
                name: item.name.to_string(),
                offset_minutes: item.settings.offset_minutes,
                volume: desired.global.volume,
                vibration: desired.global.vibration,
                snooze_minutes: desired.global.snooze_minutes,
                sound: item.settings.sound.clone(),
                language: language.clone(),
            },
        }
    }

    fn channel_for(&self, kind: ItemKind, mode: VibrationMode) -> Option<String> {
        self.permissions
            .platform()
            .supports_channels()
            .then(|| ChannelRole::for_kind(kind).channel_id(&self.channels, mode))
    }

    /// Diffs channels against `mode`. Platforms without channels are always clean.
    async fn channel_plan(&self, mode: VibrationMode, scheduled: &[NotificationItem]) -> ChannelPlan {
        if !self.permissions.platform().supports_channels() {
            return ChannelPlan::default();
        }
        match self.store.channels().await {
            Ok(existing) => reconcile_channels(&self.channels, mode, &existing, scheduled),
            Err(e) => {
                warn!("cannot list channels: {e}");
                // Unknown state is not drift, but a rewrite still creates both channels.
                ChannelPlan {
                    create: [ChannelRole::Primary, ChannelRole::Reminder]
                        .map(|role| role.channel_id(&self.channels, mode))
                        .to_vec(),
                    ..Default::default()
                }
            }
        }
    }

    /// Deletes other-mode channels, then creates the missing current-mode ones.
    async fn apply_channels(&self, plan: &ChannelPlan, mode: VibrationMode, language: &str) {
        for id in &plan.delete {
            match self.store.delete_channel(id).await {
                Ok(()) => info!(%id, "deleted stale channel"),
                Err(e) => warn!(%id, "cannot delete channel: {e}"),
            }
        }
        for role in [ChannelRole::Primary, ChannelRole::Reminder] {
            let channel = role.channel(&self.channels, mode, self.labels.as_ref(), language);
            if !plan.create.contains(&channel.id) {
                continue;
            }
            if let Err(e) = self.store.create_channel(&channel).await {
                warn!(id = %channel.id, "cannot create channel: {e}");
            }
        }
    }

    /// Reschedules already-cancelled reminders on the current reminder channel,
    /// keeping their ids and triggers. Returns how many made it back.
    async fn rehome_reminders(&self, reminders: Vec<NotificationItem>, mode: VibrationMode) -> usize {
        let mut moved = 0;
        for mut reminder in reminders {
            reminder.channel_id = self.channel_for(ItemKind::Reminder, mode);
            let id = reminder.id.clone();
            match self.store.schedule(reminder).await {
                Ok(()) => {
                    debug!(%id, "reminder moved to current channel");
                    moved += 1;
                }
                Err(source) => warn!("{}", PrayerBellError::SchedulingFailure { id, source }),
            }
        }
        moved
    }

    /// Picks the reminder channel of whichever mode is live and creates it if
    /// missing. Never deletes channels; sync owns that.
    async fn reminder_channel(&self, preferred: VibrationMode, language: &str) -> Option<String> {
        if !self.permissions.platform().supports_channels() {
            return None;
        }
        let existing = match self.store.channels().await {
            Ok(existing) => existing,
            Err(e) => {
                warn!("cannot list channels: {e}");
                Vec::new()
            }
        };
        let primary_live =
            |mode: VibrationMode| existing.contains(&ChannelRole::Primary.channel_id(&self.channels, mode));
        let mode = if primary_live(preferred) {
            preferred
        } else {
            [VibrationMode::On, VibrationMode::Off]
                .into_iter()
                .find(|mode| primary_live(*mode))
                .unwrap_or(preferred)
        };

        let channel = ChannelRole::Reminder.channel(&self.channels, mode, self.labels.as_ref(), language);
        if !existing.contains(&channel.id) {
            if let Err(e) = self.store.create_channel(&channel).await {
                warn!(id = %channel.id, "cannot create channel: {e}");
            }
        }
        Some(channel.id)
    }

    async fn require_notifications(&self) -> Result<()> {
        if self.permissions.notifications_allowed().await? {
            Ok(())
        } else {
            Err(PrayerBellError::PermissionDenied("notifications"))
        }
    }

    /// Falls back to inexact timers when the permission is missing or unknown.
    async fn exact_alarms_allowed(&self) -> bool {
        if !self.permissions.platform().supports_exact_alarms() {
            return false;
        }
        match self.permissions.exact_alarms_allowed().await {
            Ok(true) => true,
            Ok(false) => {
                info!("{}, using inexact timers", PrayerBellError::PermissionDenied("exact alarms"));
                false
            }
            Err(e) => {
                warn!("cannot query exact-alarm permission: {e}");
                false
            }
        }
    }

    /// Returns whether the cancel call succeeded. Failures are logged only.
    async fn cancel(&self, id: &str) -> bool {
        match self.store.cancel(id).await {
            Ok(()) => true,
            Err(source) => {
                warn!(
                    "{}",
                    PrayerBellError::SchedulingFailure {
                        id: id.to_string(),
                        source
                    }
                );
                false
            }
        }
    }
}
