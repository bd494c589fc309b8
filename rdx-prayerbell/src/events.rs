//! Defines the event types flowing into and out of the engine.
//!
//! [`NotificationEvent`] is what the OS reports about a notification after it
//! was scheduled. [`EngineEvent`] is what the engine broadcasts to anyone who
//! subscribes, e.g. a settings screen showing the last sync result.

use crate::common::SessionId;
use crate::components::dispatcher::DispatchOutcome;
use crate::components::scheduler::SyncOutcome;
use crate::model::NotificationMetadata;
use chrono::NaiveDate;

/// What happened to a notification instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEventType {
    /// The OS surfaced the notification.
    Delivered,
    /// The user tapped one of the action buttons.
    ActionPress { action_id: String },
    /// The user tapped the notification body.
    Press,
    /// The user swiped the notification away.
    Dismissed,
}

/// The notification an event refers to, as reported back by the OS.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveredNotification {
    pub id: String,
    /// Missing when the OS hands back a notification this engine did not create.
    pub metadata: Option<NotificationMetadata>,
}

/// An OS notification event.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    pub event_type: NotificationEventType,
    pub notification: DeliveredNotification,
}

impl NotificationEvent {
    pub fn new(event_type: NotificationEventType, notification: DeliveredNotification) -> Self {
        Self {
            event_type,
            notification,
        }
    }
}

/// Which entry point the OS used to hand over an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrigin {
    /// The app was running in the foreground.
    Foreground,
    /// The app was in the background or had been killed.
    Background,
}

impl EventOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventOrigin::Foreground => "foreground",
            EventOrigin::Background => "background",
        }
    }
}

/// Events broadcast by the engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Fired once when the engine's `run` loop begins.
    EngineStarted,
    /// Fired once when the engine's `run` loop is about to exit.
    EngineShutdown,
    /// A sync pass finished without a top-level failure.
    SyncCompleted(SyncOutcome),
    /// A sync pass was aborted. The previous schedule is untouched.
    SyncFailed { reason: String },
    /// The local calendar date changed.
    DateChanged { new_date: NaiveDate },
    /// A sound session started playing.
    SoundStarted { session: SessionId },
    /// An OS notification event was handled.
    NotificationHandled {
        id: String,
        origin: EventOrigin,
        outcome: DispatchOutcome,
    },
}
