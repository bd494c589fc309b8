//! Three-way diff between desired state, the OS-reported scheduled set, and now.
//!
//! Nothing in here performs I/O. The scheduler fetches the scheduled set,
//! hands a plain snapshot to [`reconcile`], and acts on the result.

use crate::common::{notification_id, ItemKind, VibrationMode};
use crate::config::ChannelConfig;
use crate::model::{DesiredItem, DesiredState, NotificationItem, NotificationMetadata};
use crate::platform::{is_owned_channel, ChannelRole};
use crate::time::compute_trigger;
use chrono::DateTime;
use chrono_tz::Tz;
use std::collections::HashMap;
use tracing::debug;

/// Why an enabled item no longer matches what is scheduled.
#[derive(Debug, Clone, PartialEq)]
pub enum Drift {
    Missing {
        id: String,
    },
    Metadata {
        id: String,
        field: &'static str,
    },
    Trigger {
        id: String,
        expected_ms: i64,
        actual_ms: i64,
    },
    /// A channel is missing, left over from another mode, or points nowhere.
    Channel {
        id: String,
    },
}

/// The result of comparing desired state to the scheduled set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// At least one enabled item is missing or out of date.
    pub resync: bool,
    /// Ids of managed entries that must be cancelled regardless of `resync`.
    pub stale: Vec<String>,
    /// Every mismatch found, for logging.
    pub drift: Vec<Drift>,
}

impl Reconciliation {
    pub fn is_up_to_date(&self) -> bool {
        !self.resync && self.stale.is_empty()
    }
}

/// Compares `desired` against `scheduled` as of `now`.
///
/// Enabled items need an entry with matching metadata and an identical
/// trigger. Items without a usable time are skipped. Managed entries for
/// disabled or unknown items are always reported stale. Reminder entries are
/// never looked at.
pub fn reconcile(
    desired: &DesiredState,
    scheduled: &[NotificationItem],
    now: &DateTime<Tz>,
) -> Reconciliation {
    let by_id: HashMap<&str, &NotificationItem> = scheduled
        .iter()
        .filter(|item| item.kind().is_managed())
        .map(|item| (item.id.as_str(), item))
        .collect();

    let mut result = Reconciliation::default();

    for item in desired.items() {
        let id = notification_id(item.kind, item.name);
        let existing = by_id.get(id.as_str()).copied();

        if !item.is_enabled() {
            if existing.is_some() {
                debug!(%id, "entry belongs to a disabled item");
                result.stale.push(id);
            }
            continue;
        }

        let Some(time) = item.time else {
            debug!(%id, "no time for today, skipping");
            continue;
        };
        let Some(trigger) = compute_trigger(time, item.settings.offset_minutes, now) else {
            debug!(%id, time, "unparseable time, skipping");
            continue;
        };

        let Some(existing) = existing else {
            result.drift.push(Drift::Missing { id });
            continue;
        };

        if let Some(field) = metadata_mismatch(&item, desired, &existing.metadata) {
            result.drift.push(Drift::Metadata { id, field });
            continue;
        }

        let expected_ms = trigger.timestamp_millis();
        let actual_ms = existing.trigger.timestamp_ms;
        if expected_ms != actual_ms {
            result.drift.push(Drift::Trigger {
                id,
                expected_ms,
                actual_ms,
            });
        }
    }

    for item in by_id.values() {
        if !desired.knows(&item.metadata.name) && !result.stale.contains(&item.id) {
            debug!(id = %item.id, "entry belongs to an unknown item");
            result.stale.push(item.id.clone());
        }
    }
    result.stale.sort();

    result.resync = !result.drift.is_empty();
    result
}

/// Shorthand for [`reconcile`] when only the verdict matters.
pub fn needs_resync(desired: &DesiredState, scheduled: &[NotificationItem], now: &DateTime<Tz>) -> bool {
    reconcile(desired, scheduled, now).resync
}

/// What it takes to make channels match the current vibration mode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelPlan {
    /// Current-mode channel ids that do not exist yet.
    pub create: Vec<String>,
    /// Owned channels built for another mode.
    pub delete: Vec<String>,
    /// Pending reminder ids routed to a channel other than the current one.
    pub rehome: Vec<String>,
    pub drift: Vec<Drift>,
}

impl ChannelPlan {
    pub fn is_clean(&self) -> bool {
        self.drift.is_empty()
    }
}

/// Compares the existing channels and every pending entry's routing against
/// the two channels `mode` calls for.
///
/// Managed entries on the wrong channel and reminders on the wrong channel
/// both count as drift; reminders are listed in `rehome` so they can be moved
/// rather than dropped.
pub fn reconcile_channels(
    config: &ChannelConfig,
    mode: VibrationMode,
    existing: &[String],
    scheduled: &[NotificationItem],
) -> ChannelPlan {
    let wanted = [ChannelRole::Primary, ChannelRole::Reminder].map(|role| role.channel_id(config, mode));
    let mut plan = ChannelPlan::default();

    for id in wanted.iter().filter(|id| !existing.contains(*id)) {
        plan.create.push(id.clone());
    }
    for id in existing
        .iter()
        .filter(|id| is_owned_channel(config, id) && !wanted.contains(*id))
    {
        plan.delete.push(id.clone());
    }
    for id in plan.create.iter().chain(&plan.delete) {
        plan.drift.push(Drift::Channel { id: id.clone() });
    }

    for item in scheduled {
        let expected = ChannelRole::for_kind(item.kind()).channel_id(config, mode);
        if item.channel_id.as_deref() == Some(expected.as_str()) {
            continue;
        }
        debug!(id = %item.id, channel = ?item.channel_id, %expected, "entry routed to the wrong channel");
        if item.kind() == ItemKind::Reminder {
            plan.rehome.push(item.id.clone());
        }
        plan.drift.push(Drift::Channel { id: item.id.clone() });
    }
    plan
}

/// Returns the first embedded field that disagrees with the desired state.
fn metadata_mismatch(
    item: &DesiredItem<'_>,
    desired: &DesiredState,
    embedded: &NotificationMetadata,
) -> Option<&'static str> {
    let global = &desired.global;
    if embedded.volume != global.volume {
        return Some("volume");
    }
    if embedded.vibration != global.vibration {
        return Some("vibration");
    }
    if embedded.snooze_minutes != global.snooze_minutes {
        return Some("snooze_minutes");
    }
    if embedded.offset_minutes != item.settings.offset_minutes {
        return Some("offset_minutes");
    }
    if embedded.language != desired.language {
        return Some("language");
    }
    if embedded.sound != item.settings.sound {
        return Some("sound");
    }
    None
}
