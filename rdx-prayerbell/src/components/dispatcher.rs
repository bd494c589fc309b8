//! The delivery and interaction state machine for a single notification.
//!
//! Each instance moves from DELIVERED to exactly one terminal state: an action
//! press (dismiss, snooze or ok), a body press, or a swipe-away. Only snooze
//! has a successor, a fresh one-shot reminder instance.

use crate::common::SessionId;
use crate::components::scheduler::Scheduler;
use crate::components::sound::SoundPlayer;
use crate::error::Result;
use crate::events::{EventOrigin, NotificationEvent, NotificationEventType};
use crate::model::{NotificationAction, NotificationMetadata};
use crate::platform::{NotificationStore, PermissionProvider};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// What the dispatcher did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Base notification permission is gone; nothing was touched.
    PermissionRevoked,
    /// The event carried no metadata from this engine.
    Ignored,
    /// Delivered. `session` is the sound that started, if any.
    Delivered { session: Option<SessionId> },
    /// Terminal: sound stopped and the displayed instance cancelled.
    Closed,
    /// Terminal: as `Closed`, plus a reminder scheduled under `reminder_id`.
    Snoozed { reminder_id: String },
}

/// Routes OS notification events to the sound player and scheduler.
pub struct EventDispatcher {
    store: Arc<dyn NotificationStore>,
    permissions: Arc<dyn PermissionProvider>,
    scheduler: Arc<Scheduler>,
    sound: SoundPlayer,
    reminder_sound: Option<String>,
}

impl EventDispatcher {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        permissions: Arc<dyn PermissionProvider>,
        scheduler: Arc<Scheduler>,
        sound: SoundPlayer,
        reminder_sound: Option<String>,
    ) -> Self {
        Self {
            store,
            permissions,
            scheduler,
            sound,
            reminder_sound,
        }
    }

    /// Entry point for events received while the app is in the foreground.
    pub async fn handle_foreground(&self, event: NotificationEvent) -> Result<DispatchOutcome> {
        self.handle(EventOrigin::Foreground, event).await
    }

    /// Entry point for events received in the background or after a cold start.
    pub async fn handle_background(&self, event: NotificationEvent) -> Result<DispatchOutcome> {
        self.handle(EventOrigin::Background, event).await
    }

    /// Handles one event. Both entry points run exactly this logic.
    pub async fn handle(&self, origin: EventOrigin, event: NotificationEvent) -> Result<DispatchOutcome> {
        let span = info_span!("notification", origin = origin.as_str(), id = %event.notification.id);
        self.dispatch(event).instrument(span).await
    }

    async fn dispatch(&self, event: NotificationEvent) -> Result<DispatchOutcome> {
        match self.permissions.notifications_allowed().await {
            Ok(true) => {}
            Ok(false) => {
                debug!("notification permission revoked, ignoring event");
                return Ok(DispatchOutcome::PermissionRevoked);
            }
            Err(e) => {
                warn!("cannot query notification permission: {e}");
                return Ok(DispatchOutcome::PermissionRevoked);
            }
        }

        let id = event.notification.id;
        let Some(metadata) = event.notification.metadata else {
            debug!("event without metadata, ignoring");
            return Ok(DispatchOutcome::Ignored);
        };

        match event.event_type {
            NotificationEventType::Delivered => {
                let session = self.on_delivered(&metadata).await;
                Ok(DispatchOutcome::Delivered { session })
            }
            NotificationEventType::ActionPress { action_id } => {
                match NotificationAction::from_id(&action_id) {
                    Some(NotificationAction::Snooze) => self.snooze(&id, &metadata).await,
                    Some(NotificationAction::Dismiss) | Some(NotificationAction::Ok) => {
                        info!(action = %action_id, "closing notification");
                        self.close(&id).await;
                        Ok(DispatchOutcome::Closed)
                    }
                    None => {
                        warn!(action = %action_id, "unknown action, treating as dismiss");
                        self.close(&id).await;
                        Ok(DispatchOutcome::Closed)
                    }
                }
            }
            NotificationEventType::Press | NotificationEventType::Dismissed => {
                info!("closing notification");
                self.close(&id).await;
                Ok(DispatchOutcome::Closed)
            }
        }
    }

    async fn on_delivered(&self, metadata: &NotificationMetadata) -> Option<SessionId> {
        let sound = if metadata.kind.is_alarm() {
            metadata.sound.as_deref()
        } else {
            self.reminder_sound.as_deref()
        };
        info!(kind = %metadata.kind, name = %metadata.name, "delivered");

        match self.sound.start(sound, metadata.volume).await {
            Ok(session) => session,
            Err(e) => {
                warn!("cannot play alert sound: {e}");
                None
            }
        }
    }

    /// A reminder that cannot be scheduled degrades to a plain close.
    async fn snooze(&self, id: &str, metadata: &NotificationMetadata) -> Result<DispatchOutcome> {
        self.close(id).await;
        match self.scheduler.schedule_snooze(metadata).await {
            Ok(reminder_id) => {
                info!(%reminder_id, "snoozed");
                Ok(DispatchOutcome::Snoozed { reminder_id })
            }
            Err(e) => {
                warn!("snooze reminder not scheduled: {e}");
                Ok(DispatchOutcome::Closed)
            }
        }
    }

    /// Stops the sound and removes the displayed instance.
    async fn close(&self, id: &str) {
        self.sound.stop().await;
        if let Err(e) = self.store.cancel_displayed(id).await {
            warn!("cannot cancel displayed notification: {e}");
        }
    }
}
