//! Boundary traits for everything the engine does not own.
//!
//! The OS notification store, the permission system, the audio stack and the
//! translation tables all live outside this crate. The engine only ever talks
//! to them through these traits, so a host app supplies real bindings and tests
//! supply the in-memory versions from [`memory`].

pub mod memory;

use crate::common::{ItemKind, Platform, VibrationMode};
use crate::config::ChannelConfig;
use crate::error::{PlatformError, SoundError};
use crate::model::NotificationItem;
use async_trait::async_trait;
use tokio::sync::oneshot;

/// The OS-owned store of pending and displayed notifications.
///
/// This store is the only record of what is currently scheduled.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Lists every pending (trigger) notification.
    async fn scheduled(&self) -> Result<Vec<NotificationItem>, PlatformError>;

    /// Creates or replaces the notification with `item.id`.
    async fn schedule(&self, item: NotificationItem) -> Result<(), PlatformError>;

    /// Cancels both the pending trigger and any displayed instance.
    async fn cancel(&self, id: &str) -> Result<(), PlatformError>;

    /// Removes only the displayed instance, leaving a repeating trigger intact.
    async fn cancel_displayed(&self, id: &str) -> Result<(), PlatformError>;

    async fn channels(&self) -> Result<Vec<String>, PlatformError>;

    /// Creating a channel that already exists with the same id is a no-op.
    async fn create_channel(&self, channel: &Channel) -> Result<(), PlatformError>;

    async fn delete_channel(&self, id: &str) -> Result<(), PlatformError>;
}

/// Device capability queries.
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    async fn notifications_allowed(&self) -> Result<bool, PlatformError>;

    async fn exact_alarms_allowed(&self) -> Result<bool, PlatformError>;

    fn platform(&self) -> Platform;
}

/// Loads playable sound assets.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    async fn load(&self, file: &str) -> Result<Box<dyn AudioTrack>, SoundError>;
}

/// A loaded sound asset holding a native resource until released.
#[async_trait]
pub trait AudioTrack: Send {
    fn set_volume(&mut self, volume: f32);

    /// Starts playback once. The receiver resolves with `true` when the clip
    /// played to the end and `false` when it failed midway.
    async fn play(&mut self) -> Result<oneshot::Receiver<bool>, SoundError>;

    async fn release(&mut self);
}

/// Label lookup for notification titles and bodies.
pub trait Labels: Send + Sync {
    fn tr(&self, key: &str, language: &str) -> String;
}

/// English labels used when the host supplies no translations.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLabels;

impl Labels for DefaultLabels {
    fn tr(&self, key: &str, _language: &str) -> String {
        match key {
            "body.prayer" => "It is time for prayer".to_string(),
            "body.event" => "Upcoming time of day".to_string(),
            "body.special" => "Reminder".to_string(),
            "body.reminder" => "Snoozed reminder".to_string(),
            "channel.primary" => "Prayer times".to_string(),
            "channel.reminder" => "Reminders".to_string(),
            other => other.to_string(),
        }
    }
}

/// Notification importance as understood by channel-capable platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Importance {
    High,
    Default,
}

/// An OS-level notification grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub importance: Importance,
    pub vibration: bool,
    /// Notifications in this channel cannot be swiped away.
    pub ongoing: bool,
}

/// Which of the two logical channels a notification goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    Primary,
    Reminder,
}

impl ChannelRole {
    pub fn for_kind(kind: ItemKind) -> Self {
        if kind.is_alarm() {
            ChannelRole::Primary
        } else {
            ChannelRole::Reminder
        }
    }

    pub fn channel_id(&self, config: &ChannelConfig, mode: VibrationMode) -> String {
        let prefix = match self {
            ChannelRole::Primary => &config.primary_prefix,
            ChannelRole::Reminder => &config.reminder_prefix,
        };
        format!("{prefix}-vibration-{mode}")
    }

    pub fn channel(&self, config: &ChannelConfig, mode: VibrationMode, labels: &dyn Labels, language: &str) -> Channel {
        match self {
            ChannelRole::Primary => Channel {
                id: self.channel_id(config, mode),
                name: labels.tr("channel.primary", language),
                importance: Importance::High,
                vibration: mode.vibrates(),
                ongoing: true,
            },
            ChannelRole::Reminder => Channel {
                id: self.channel_id(config, mode),
                name: labels.tr("channel.reminder", language),
                importance: Importance::Default,
                vibration: mode.vibrates(),
                ongoing: false,
            },
        }
    }
}

/// Whether a channel id belongs to this engine, under any vibration mode.
pub fn is_owned_channel(config: &ChannelConfig, id: &str) -> bool {
    [&config.primary_prefix, &config.reminder_prefix]
        .iter()
        .any(|prefix| id.starts_with(&format!("{prefix}-vibration-")))
}
