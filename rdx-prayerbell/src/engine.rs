//! The core engine that wires the notification components together.

use crate::components::dispatcher::{DispatchOutcome, EventDispatcher};
use crate::components::scheduler::{Scheduler, SyncOutcome};
use crate::components::sound::SoundPlayer;
use crate::components::watcher::DayWatcher;
use crate::config::PrayerBellConfig;
use crate::error::Result;
use crate::events::{EngineEvent, EventOrigin, NotificationEvent};
use crate::model::DesiredState;
use crate::platform::{AudioBackend, Labels, NotificationStore, PermissionProvider};
use crate::time::Clock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, trace};

/// The host-provided implementations of every external collaborator.
#[derive(Clone)]
pub struct PlatformBindings {
    pub store: Arc<dyn NotificationStore>,
    pub permissions: Arc<dyn PermissionProvider>,
    pub audio: Arc<dyn AudioBackend>,
    pub labels: Arc<dyn Labels>,
    pub clock: Arc<dyn Clock>,
}

/// The main Prayerbell engine.
///
/// This struct is the central point of control. It holds the configuration,
/// owns the scheduler, dispatcher and sound player, and drives the reactive
/// loop that turns desired-state changes into sync passes. The engine is
/// designed to be cloned and shared across tasks, providing a handle to the
/// running instance.
#[derive(Clone)]
pub struct PrayerBellEngine {
    config: Arc<PrayerBellConfig>,
    clock: Arc<dyn Clock>,
    scheduler: Arc<Scheduler>,
    dispatcher: Arc<EventDispatcher>,
    sound: SoundPlayer,
    desired_sender: Arc<watch::Sender<Option<DesiredState>>>,
    engine_event_sender: broadcast::Sender<EngineEvent>,
}

// Core implementation block for internal logic.
impl PrayerBellEngine {
    /// Creates a new `PrayerBellEngine` over the given platform bindings.
    pub fn new(config: PrayerBellConfig, bindings: PlatformBindings) -> Self {
        let (engine_event_sender, _) = broadcast::channel(64);
        let (desired_sender, _) = watch::channel(None);

        let scheduler = Arc::new(Scheduler::new(
            bindings.store.clone(),
            bindings.permissions.clone(),
            bindings.labels.clone(),
            bindings.clock.clone(),
            config.channels.clone(),
            config.default_snooze_minutes,
        ));
        let sound = SoundPlayer::new(
            bindings.audio.clone(),
            Duration::from_secs(config.sound.auto_stop_secs),
        );
        let dispatcher = Arc::new(EventDispatcher::new(
            bindings.store.clone(),
            bindings.permissions.clone(),
            scheduler.clone(),
            sound.clone(),
            config.sound.reminder_sound.clone(),
        ));

        Self {
            config: Arc::new(config),
            clock: bindings.clock,
            scheduler,
            dispatcher,
            sound,
            desired_sender: Arc::new(desired_sender),
            engine_event_sender,
        }
    }

    #[doc(hidden)]
    async fn reactive_loop(self, shutdown: impl Future<Output = ()>) {
        let mut desired_rx = self.desired_sender.subscribe();
        let mut day_watcher = DayWatcher::new(&self.clock.now());
        let mut day_check =
            tokio::time::interval(Duration::from_secs(self.config.watch.day_check_secs.max(1)));
        tokio::pin!(shutdown);

        self.engine_event_sender.send(EngineEvent::EngineStarted).ok();
        // A fresh receiver has already seen whatever was published before startup.
        let published = self.desired_sender.borrow().is_some();
        if published {
            self.run_pass().await;
        }
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                changed = desired_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    trace!("desired state changed");
                    self.run_pass().await;
                }
                _ = day_check.tick() => {
                    if let Some(new_date) = day_watcher.observe(&self.clock.now()) {
                        info!(%new_date, "local date changed");
                        self.engine_event_sender
                            .send(EngineEvent::DateChanged { new_date })
                            .ok();
                        self.run_pass().await;
                    }
                }
            }
        }
    }

    /// Runs one sync pass against the latest desired state and broadcasts the result.
    #[doc(hidden)]
    async fn run_pass(&self) -> Option<Result<SyncOutcome>> {
        // Clone out so the watch lock is not held across the pass.
        let desired = self.desired_sender.borrow().clone()?;
        let result = self.scheduler.sync(&desired).await;
        match &result {
            Ok(outcome) => {
                self.engine_event_sender
                    .send(EngineEvent::SyncCompleted(*outcome))
                    .ok();
            }
            Err(e) => {
                error!("sync pass aborted: {e}");
                self.engine_event_sender
                    .send(EngineEvent::SyncFailed {
                        reason: e.to_string(),
                    })
                    .ok();
            }
        }
        Some(result)
    }

    #[doc(hidden)]
    async fn on_event(&self, origin: EventOrigin, event: NotificationEvent) -> Result<DispatchOutcome> {
        let id = event.notification.id.clone();
        let outcome = self.dispatcher.handle(origin, event).await?;
        if let DispatchOutcome::Delivered {
            session: Some(session),
        } = &outcome
        {
            self.engine_event_sender
                .send(EngineEvent::SoundStarted { session: *session })
                .ok();
        }
        self.engine_event_sender
            .send(EngineEvent::NotificationHandled {
                id,
                origin,
                outcome: outcome.clone(),
            })
            .ok();
        Ok(outcome)
    }
}

// Public API implementation block.
impl PrayerBellEngine {
    /// Runs the reactive loop until a Ctrl+C signal is received.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!("PrayerBellEngine starting up...");
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);

        let engine = self.clone();
        let handle = tokio::spawn(async move {
            engine
                .reactive_loop(async move {
                    shutdown_rx.recv().await.ok();
                })
                .await
        });

        info!("Engine running. Press Ctrl+C to shut down.");
        tokio::signal::ctrl_c().await?;

        info!("Shutdown signal received.");
        if shutdown_tx.send(()).is_err() {
            error!("Failed to send shutdown signal. The reactive loop may not terminate gracefully.");
        }
        handle.await?;
        self.shutdown().await;
        Ok(())
    }

    /// Runs the reactive loop until `shutdown` resolves.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) {
        self.clone().reactive_loop(shutdown).await;
        self.shutdown().await;
    }

    /// Publishes a new desired state. Only the latest unprocessed snapshot is kept.
    pub fn update_desired(&self, desired: DesiredState) {
        self.desired_sender.send_replace(Some(desired));
    }

    /// Runs a sync pass right now against the latest desired state.
    ///
    /// Returns `None` if no desired state has been published yet.
    pub async fn sync_now(&self) -> Option<Result<SyncOutcome>> {
        self.run_pass().await
    }

    /// Foreground subscription entry point for OS notification events.
    pub async fn on_foreground_event(&self, event: NotificationEvent) -> Result<DispatchOutcome> {
        self.on_event(EventOrigin::Foreground, event).await
    }

    /// Background / killed-app entry point for OS notification events.
    pub async fn on_background_event(&self, event: NotificationEvent) -> Result<DispatchOutcome> {
        self.on_event(EventOrigin::Background, event).await
    }

    /// Stops any playing alert sound.
    pub async fn stop_sound(&self) {
        self.sound.stop().await;
    }

    /// Subscribes to the `EngineEvent` stream.
    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.engine_event_sender.subscribe()
    }

    pub fn config(&self) -> &PrayerBellConfig {
        &self.config
    }

    async fn shutdown(&self) {
        self.sound.stop().await;
        self.engine_event_sender.send(EngineEvent::EngineShutdown).ok();
        info!("PrayerBellEngine has shut down.");
    }
}
