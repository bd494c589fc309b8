//! Contains common, primitive types shared across the Prayerbell engine.
//!
//! This module defines the small vocabulary the rest of the crate speaks:
//! what kind of item a notification belongs to, how it repeats, which
//! vibration mode a channel was built for, and the identifiers used to
//! address notifications and sound sessions.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;
use std::str::FromStr;

new_key_type! {
    /// Uniquely identifies one sound playback session.
    ///
    /// Keys are generational, so a timer holding the id of a session that has
    /// already been replaced can never stop its successor.
    pub struct SessionId;
}

/// Names the upstream service reports as obligatory prayers, in day order.
pub const PRAYER_NAMES: [&str; 5] = ["Fajr", "Dhuhr", "Asr", "Maghrib", "Isha"];

/// Names the upstream service reports as non-prayer events, in day order.
pub const EVENT_NAMES: [&str; 6] = [
    "Imsak",
    "Sunrise",
    "Sunset",
    "Midnight",
    "Firstthird",
    "Lastthird",
];

/// The category a notification belongs to.
///
/// The kind decides the channel, the available actions, which sound plays on
/// delivery, and whether a sync pass owns the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Prayer,
    Event,
    Special,
    Reminder,
}

impl ItemKind {
    /// Classifies a named time reported by the upstream prayer-time service.
    pub fn classify(name: &str) -> Self {
        if PRAYER_NAMES.iter().any(|p| p.eq_ignore_ascii_case(name)) {
            ItemKind::Prayer
        } else if EVENT_NAMES.iter().any(|e| e.eq_ignore_ascii_case(name)) {
            ItemKind::Event
        } else {
            ItemKind::Special
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Prayer => "prayer",
            ItemKind::Event => "event",
            ItemKind::Special => "special",
            ItemKind::Reminder => "reminder",
        }
    }

    /// Creation order within a sync pass. Lower runs first.
    pub fn priority(&self) -> u8 {
        match self {
            ItemKind::Prayer => 0,
            ItemKind::Event => 1,
            ItemKind::Special => 2,
            ItemKind::Reminder => 3,
        }
    }

    /// Kinds whose entries are created and cancelled by a sync pass.
    ///
    /// Reminders are spawned by snoozes and left alone by sync.
    pub fn is_managed(&self) -> bool {
        !matches!(self, ItemKind::Reminder)
    }

    /// Kinds that ring the item's own sound and offer a dismiss/snooze pair.
    pub fn is_alarm(&self) -> bool {
        matches!(self, ItemKind::Prayer | ItemKind::Event)
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the deterministic id for a prayer, event or special item.
///
/// Recreating an item under the same id replaces it instead of duplicating it.
pub fn notification_id(kind: ItemKind, name: &str) -> String {
    format!("{}-{}", kind.as_str(), name)
}

/// Builds a process-unique id for a snooze reminder.
pub fn reminder_id(name: &str, created_at_ms: i64) -> String {
    format!("{}-{}-{}", ItemKind::Reminder.as_str(), name, created_at_ms)
}

/// How the OS should repeat a timestamp trigger after it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatFrequency {
    Daily,
    Weekly,
    None,
}

/// Global vibration preference. Channels are built per mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VibrationMode {
    #[default]
    On,
    Off,
}

impl VibrationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VibrationMode::On => "on",
            VibrationMode::Off => "off",
        }
    }

    pub fn vibrates(&self) -> bool {
        matches!(self, VibrationMode::On)
    }
}

impl fmt::Display for VibrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VibrationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" | "true" | "1" => Ok(VibrationMode::On),
            "off" | "false" | "0" => Ok(VibrationMode::Off),
            other => Err(format!("unknown vibration mode '{other}'")),
        }
    }
}

/// The host operating system family. Channel and exact-alarm support differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    pub fn supports_channels(&self) -> bool {
        matches!(self, Platform::Android)
    }

    pub fn supports_exact_alarms(&self) -> bool {
        matches!(self, Platform::Android)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_names() {
        assert_eq!(ItemKind::classify("Fajr"), ItemKind::Prayer);
        assert_eq!(ItemKind::classify("isha"), ItemKind::Prayer);
        assert_eq!(ItemKind::classify("Sunrise"), ItemKind::Event);
        assert_eq!(ItemKind::classify("Jumuah"), ItemKind::Special);
    }

    #[test]
    fn ids_are_deterministic_for_managed_kinds() {
        assert_eq!(notification_id(ItemKind::Prayer, "Fajr"), "prayer-Fajr");
        assert_eq!(reminder_id("Fajr", 1_700_000_000_000), "reminder-Fajr-1700000000000");
    }

    #[test]
    fn reminders_are_not_managed() {
        assert!(ItemKind::Prayer.is_managed());
        assert!(ItemKind::Special.is_managed());
        assert!(!ItemKind::Reminder.is_managed());
    }

    #[test]
    fn parses_vibration_mode() {
        assert_eq!("on".parse::<VibrationMode>(), Ok(VibrationMode::On));
        assert_eq!(" OFF ".parse::<VibrationMode>(), Ok(VibrationMode::Off));
        assert!("loud".parse::<VibrationMode>().is_err());
    }
}
