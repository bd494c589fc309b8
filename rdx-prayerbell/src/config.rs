//! Defines all configuration structures for the Prayerbell engine.
//!
//! These structs are designed to be deserialized from a configuration file
//! (e.g., a TOML file) using `serde`, with `PRAYERBELL__*` environment
//! variables layered on top. Nothing here is user-facing settings; volume,
//! vibration and per-prayer choices arrive at runtime as a
//! [`DesiredState`](crate::model::DesiredState).

use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;

/// The top-level configuration for the `PrayerBellEngine`.
#[derive(Debug, Clone, Deserialize)]
pub struct PrayerBellConfig {
    /// The timezone prayer times are expressed in. Uses the string names from
    /// the IANA Time Zone Database (e.g., "Africa/Cairo"). Defaults to UTC.
    #[serde(default = "default_timezone")]
    pub timezone: Tz,

    #[serde(default)]
    pub sound: SoundConfig,

    #[serde(default)]
    pub channels: ChannelConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    /// Used when a notification carries a snooze of zero minutes.
    #[serde(default = "default_snooze_minutes")]
    pub default_snooze_minutes: u32,
}

/// Audio session limits.
#[derive(Debug, Clone, Deserialize)]
pub struct SoundConfig {
    /// Upper bound on a single playback, in case completion is never reported.
    #[serde(default = "default_auto_stop_secs")]
    pub auto_stop_secs: u64,

    /// Played on delivery of reminders and specials. Silent when unset.
    #[serde(default)]
    pub reminder_sound: Option<String>,
}

/// Channel id prefixes. The vibration mode is appended to each.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_primary_prefix")]
    pub primary_prefix: String,

    #[serde(default = "default_reminder_prefix")]
    pub reminder_prefix: String,
}

/// How often the engine checks for a local date change.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_day_check_secs")]
    pub day_check_secs: u64,
}

impl PrayerBellConfig {
    /// Loads the configuration from an optional TOML file plus environment
    /// overrides such as `PRAYERBELL__TIMEZONE=Europe/Istanbul`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("PRAYERBELL").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

// --- Default value functions for serde ---

fn default_timezone() -> Tz {
    Tz::UTC
}

fn default_snooze_minutes() -> u32 {
    10
}

fn default_auto_stop_secs() -> u64 {
    300
}

fn default_primary_prefix() -> String {
    "prayer".to_string()
}

fn default_reminder_prefix() -> String {
    "reminder".to_string()
}

fn default_day_check_secs() -> u64 {
    60
}

impl Default for PrayerBellConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            sound: SoundConfig::default(),
            channels: ChannelConfig::default(),
            watch: WatchConfig::default(),
            default_snooze_minutes: default_snooze_minutes(),
        }
    }
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            auto_stop_secs: default_auto_stop_secs(),
            reminder_sound: None,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            primary_prefix: default_primary_prefix(),
            reminder_prefix: default_reminder_prefix(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            day_check_secs: default_day_check_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_partial_toml() {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                timezone = "Africa/Cairo"

                [sound]
                reminder_sound = "chime.mp3"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config: PrayerBellConfig = settings.try_deserialize().unwrap();

        assert_eq!(config.timezone, chrono_tz::Africa::Cairo);
        assert_eq!(config.sound.reminder_sound.as_deref(), Some("chime.mp3"));
        assert_eq!(config.sound.auto_stop_secs, 300);
        assert_eq!(config.channels.primary_prefix, "prayer");
        assert_eq!(config.default_snooze_minutes, 10);
    }

    #[test]
    fn empty_source_uses_defaults() {
        let settings = config::Config::builder().build().unwrap();
        let config: PrayerBellConfig = settings.try_deserialize().unwrap();
        assert_eq!(config.timezone, Tz::UTC);
        assert_eq!(config.watch.day_check_secs, 60);
    }
}
