//! Desired-state snapshots and the notification descriptors written to the OS.

use crate::common::{ItemKind, RepeatFrequency, VibrationMode};
use crate::error::{PrayerBellError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Global notification preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifSettings {
    /// Playback volume in `[0, 1]`.
    pub volume: f32,
    pub vibration: VibrationMode,
    pub snooze_minutes: u32,
}

impl Default for NotifSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            vibration: VibrationMode::On,
            snooze_minutes: 10,
        }
    }
}

/// Per-item preferences for one named time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemSettings {
    pub enabled: bool,
    /// Signed minutes relative to the item's time. Negative fires earlier.
    #[serde(default)]
    pub offset_minutes: i32,
    #[serde(default)]
    pub sound: Option<String>,
}

impl ItemSettings {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    pub fn with_offset(mut self, offset_minutes: i32) -> Self {
        self.offset_minutes = offset_minutes;
        self
    }

    pub fn with_sound(mut self, sound: impl Into<String>) -> Self {
        self.sound = Some(sound.into());
        self
    }
}

/// Everything a sync pass needs to know about what *should* be scheduled.
///
/// Recomputed by the host on every upstream change and handed to the engine
/// as a whole snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesiredState {
    /// Named local `HH:mm` times for the current day.
    pub prayer_times: BTreeMap<String, String>,
    pub item_settings: BTreeMap<String, ItemSettings>,
    pub global: NotifSettings,
    pub language: String,
}

/// One named time joined with its settings, in creation order.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredItem<'a> {
    pub name: &'a str,
    pub kind: ItemKind,
    pub time: Option<&'a str>,
    pub settings: ItemSettings,
}

impl DesiredItem<'_> {
    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }
}

impl DesiredState {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Default::default()
        }
    }

    pub fn with_time(mut self, name: impl Into<String>, time: impl Into<String>) -> Self {
        self.prayer_times.insert(name.into(), time.into());
        self
    }

    pub fn with_item(mut self, name: impl Into<String>, settings: ItemSettings) -> Self {
        self.item_settings.insert(name.into(), settings);
        self
    }

    pub fn with_global(mut self, global: NotifSettings) -> Self {
        self.global = global;
        self
    }

    /// Fails with [`PrayerBellError::MissingUpstreamData`] when no times are known.
    pub fn ensure_times(&self) -> Result<()> {
        if self.prayer_times.is_empty() {
            return Err(PrayerBellError::MissingUpstreamData);
        }
        Ok(())
    }

    /// Whether `name` is present in either the times or the settings.
    pub fn knows(&self, name: &str) -> bool {
        self.prayer_times.contains_key(name) || self.item_settings.contains_key(name)
    }

    /// Joins times and settings, ordered prayers first, then events, then specials.
    ///
    /// Names with a time but no settings come out disabled. Names with settings
    /// but no time come out with `time: None`.
    pub fn items(&self) -> Vec<DesiredItem<'_>> {
        let mut names: Vec<&str> = self
            .prayer_times
            .keys()
            .chain(self.item_settings.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();

        let mut items: Vec<DesiredItem<'_>> = names
            .into_iter()
            .map(|name| DesiredItem {
                name,
                kind: ItemKind::classify(name),
                time: self.prayer_times.get(name).map(String::as_str),
                settings: self.item_settings.get(name).cloned().unwrap_or_default(),
            })
            .collect();
        items.sort_by_key(|item| (item.kind.priority(), day_order(item.name)));
        items
    }
}

/// Position of a catalogued name within its day, unknown names last.
fn day_order(name: &str) -> usize {
    crate::common::PRAYER_NAMES
        .iter()
        .chain(crate::common::EVENT_NAMES.iter())
        .position(|known| known.eq_ignore_ascii_case(name))
        .unwrap_or(usize::MAX)
}

/// Context embedded in every notification.
///
/// The OS store is the only place this survives between scheduling and
/// delivery, so everything the dispatcher needs later must be in here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMetadata {
    pub kind: ItemKind,
    pub name: String,
    pub offset_minutes: i32,
    pub volume: f32,
    pub vibration: VibrationMode,
    pub snooze_minutes: u32,
    pub sound: Option<String>,
    pub language: String,
}

/// A user-facing action button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationAction {
    Dismiss,
    Snooze,
    Ok,
}

impl NotificationAction {
    pub fn id(&self) -> &'static str {
        match self {
            NotificationAction::Dismiss => "dismiss",
            NotificationAction::Snooze => "snooze",
            NotificationAction::Ok => "ok",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "dismiss" => Some(NotificationAction::Dismiss),
            "snooze" => Some(NotificationAction::Snooze),
            "ok" => Some(NotificationAction::Ok),
            _ => None,
        }
    }

    /// Buttons offered for a kind.
    pub fn for_kind(kind: ItemKind) -> Vec<Self> {
        if kind.is_alarm() {
            vec![NotificationAction::Dismiss, NotificationAction::Snooze]
        } else {
            vec![NotificationAction::Ok]
        }
    }
}

/// A timestamp trigger as understood by the OS scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub timestamp_ms: i64,
    pub repeat: RepeatFrequency,
    /// Use exact-alarm scheduling. Only set while that permission is granted.
    pub exact: bool,
}

/// A notification as submitted to, and reported back by, the OS store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationItem {
    pub id: String,
    pub label: String,
    pub body: String,
    pub channel_id: Option<String>,
    pub trigger: Trigger,
    pub actions: Vec<NotificationAction>,
    pub metadata: NotificationMetadata,
}

impl NotificationItem {
    pub fn kind(&self) -> ItemKind {
        self.metadata.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_are_ordered_by_kind_then_day() {
        let desired = DesiredState::new("en")
            .with_time("Jumuah", "12:30")
            .with_time("Isha", "19:40")
            .with_time("Sunrise", "06:40")
            .with_time("Fajr", "05:12")
            .with_time("Dhuhr", "12:10");

        let names: Vec<&str> = desired.items().iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["Fajr", "Dhuhr", "Isha", "Sunrise", "Jumuah"]);
    }

    #[test]
    fn unset_items_are_disabled() {
        let desired = DesiredState::new("en").with_time("Fajr", "05:12");
        let items = desired.items();
        assert_eq!(items.len(), 1);
        assert!(!items[0].is_enabled());
    }

    #[test]
    fn settings_without_time_are_kept() {
        let desired = DesiredState::new("en")
            .with_time("Fajr", "05:12")
            .with_item("Asr", ItemSettings::enabled());
        let asr = desired.items().into_iter().find(|i| i.name == "Asr").unwrap();
        assert!(asr.is_enabled());
        assert_eq!(asr.time, None);
    }

    #[test]
    fn empty_times_are_missing_upstream_data() {
        let desired = DesiredState::new("en").with_item("Fajr", ItemSettings::enabled());
        assert!(matches!(
            desired.ensure_times(),
            Err(PrayerBellError::MissingUpstreamData)
        ));
    }

    #[test]
    fn alarm_kinds_offer_snooze() {
        assert_eq!(
            NotificationAction::for_kind(ItemKind::Prayer),
            vec![NotificationAction::Dismiss, NotificationAction::Snooze]
        );
        assert_eq!(
            NotificationAction::for_kind(ItemKind::Reminder),
            vec![NotificationAction::Ok]
        );
    }
}
