use anyhow::Result;
use chrono::Duration as ChronoDuration;
use colored::Colorize;
use prayerbell::platform::memory::{MemoryStore, SimulatedAudio, StaticPermissions};
use prayerbell::platform::DefaultLabels;
use prayerbell::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    // 2. Load configuration from an optional file given as the first argument.
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = PrayerBellConfig::load(config_path.as_deref())?;

    // 3. Bind the in-memory platform and create the engine.
    let store = MemoryStore::new();
    let clock = SystemClock::new(config.timezone);
    let bindings = PlatformBindings {
        store: Arc::new(store.clone()),
        permissions: Arc::new(StaticPermissions::granted(Platform::Android)),
        audio: Arc::new(SimulatedAudio::new(Duration::from_secs(8))),
        labels: Arc::new(DefaultLabels),
        clock: Arc::new(clock),
    };
    let engine = PrayerBellEngine::new(config, bindings);

    // 4. Listen to engine events and pretend to be the OS delivering notifications.
    spawn_event_listener(&engine);
    spawn_delivery_simulator(&engine, store, clock);

    // 5. Publish a desired state with times a few minutes from now.
    engine.update_desired(demo_state(&clock));

    // 6. Run the engine.
    engine.run().await?;

    Ok(())
}

/// Builds a state whose first items fire within the next few minutes.
fn demo_state(clock: &SystemClock) -> DesiredState {
    let now = clock.now();
    let at = |minutes: i64| (now + ChronoDuration::minutes(minutes)).format("%H:%M").to_string();

    DesiredState::new("en")
        .with_time("Fajr", at(1))
        .with_time("Sunrise", at(2))
        .with_time("Dhuhr", at(3))
        .with_time("Asr", "abc")
        .with_item("Fajr", ItemSettings::enabled().with_sound("adhan.mp3"))
        .with_item("Sunrise", ItemSettings::enabled().with_sound("bird.mp3"))
        .with_item("Dhuhr", ItemSettings::enabled().with_offset(-1).with_sound("adhan.mp3"))
        .with_item("Asr", ItemSettings::enabled())
}

fn spawn_event_listener(engine: &PrayerBellEngine) {
    let mut events = engine.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!("{} => {:?}", "[ENGINE]".cyan().bold(), event);
        }
    });
}

/// Polls the in-memory store and delivers whatever is due, the way the OS would.
fn spawn_delivery_simulator(engine: &PrayerBellEngine, store: MemoryStore, clock: SystemClock) {
    let engine = engine.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            let now_ms = clock.now().timestamp_millis();
            for item in store.pending().await {
                if item.trigger.timestamp_ms > now_ms {
                    continue;
                }
                let Some(delivered) = store.deliver(&item.id).await else {
                    continue;
                };
                info!("{} {} ({})", "[OS]".yellow().bold(), delivered.label, delivered.id);
                let event = NotificationEvent::new(
                    NotificationEventType::Delivered,
                    DeliveredNotification {
                        id: delivered.id.clone(),
                        metadata: Some(delivered.metadata.clone()),
                    },
                );
                if let Err(e) = engine.on_background_event(event).await {
                    info!("delivery handling failed: {e}");
                }
            }
        }
    });
}
