use chrono::{Duration as ChronoDuration, TimeZone};
use chrono_tz::Tz;
use prayerbell::platform::memory::{MemoryStore, SimulatedAudio, StaticPermissions, StoreOp};
use prayerbell::platform::DefaultLabels;
use prayerbell::prelude::*;
use std::sync::Arc;
use std::time::Duration;

struct Rig {
    store: MemoryStore,
    clock: ManualClock,
    engine: PrayerBellEngine,
}

fn rig_at(now: chrono::DateTime<Tz>) -> Rig {
    let store = MemoryStore::new();
    let clock = ManualClock::new(now);
    let bindings = PlatformBindings {
        store: Arc::new(store.clone()),
        permissions: Arc::new(StaticPermissions::granted(Platform::Android)),
        audio: Arc::new(SimulatedAudio::new(Duration::from_secs(3600))),
        labels: Arc::new(DefaultLabels),
        clock: Arc::new(clock.clone()),
    };
    Rig {
        store,
        clock,
        engine: PrayerBellEngine::new(PrayerBellConfig::default(), bindings),
    }
}

fn morning() -> chrono::DateTime<Tz> {
    Tz::UTC.with_ymd_and_hms(2026, 3, 10, 3, 0, 0).unwrap()
}

fn day() -> DesiredState {
    DesiredState::new("en")
        .with_time("Fajr", "05:12")
        .with_time("Sunrise", "06:40")
        .with_time("Dhuhr", "12:10")
        .with_time("Asr", "15:30")
        .with_item("Fajr", ItemSettings::enabled().with_offset(-10).with_sound("adhan.mp3"))
        .with_item("Sunrise", ItemSettings::enabled())
        .with_item("Dhuhr", ItemSettings::enabled().with_sound("adhan.mp3"))
        .with_item("Asr", ItemSettings::enabled())
}

async fn sync(rig: &Rig, desired: DesiredState) -> SyncOutcome {
    rig.engine.update_desired(desired);
    rig.engine
        .sync_now()
        .await
        .expect("desired state published")
        .expect("sync succeeds")
}

#[tokio::test]
async fn repeated_sync_makes_no_os_calls() {
    let rig = rig_at(morning());
    assert_eq!(sync(&rig, day()).await.scheduled_count(), 4);
    rig.store.clear_ops().await;

    let outcome = sync(&rig, day()).await;
    assert_eq!(outcome, SyncOutcome::UpToDate { cancelled: 0 });
    assert!(rig.store.ops().await.is_empty());
}

#[tokio::test]
async fn unrelated_reemission_does_not_rewrite() {
    let rig = rig_at(morning());
    sync(&rig, day()).await;
    rig.store.clear_ops().await;

    // Same content, rebuilt from scratch, a minute later.
    rig.clock.advance(ChronoDuration::minutes(1));
    let outcome = sync(&rig, day()).await;
    assert_eq!(outcome.scheduled_count(), 0);
    assert!(rig.store.ops().await.is_empty());
}

#[tokio::test]
async fn genuine_change_rewrites_managed_set() {
    let rig = rig_at(morning());
    sync(&rig, day()).await;
    rig.store.clear_ops().await;

    let mut louder = day();
    louder.global.volume = 0.4;
    let outcome = sync(&rig, louder).await;

    assert_eq!(
        outcome,
        SyncOutcome::Rescheduled {
            scheduled: 4,
            failed: 0,
            cancelled: 4
        }
    );
    let ops = rig.store.ops().await;
    let first_schedule = ops.iter().position(|op| matches!(op, StoreOp::Schedule(_)));
    let last_cancel = ops.iter().rposition(|op| matches!(op, StoreOp::Cancel(_)));
    assert!(last_cancel < first_schedule, "cancels must precede creates: {ops:?}");
    assert!(rig
        .store
        .pending()
        .await
        .iter()
        .all(|item| item.metadata.volume == 0.4));
}

#[tokio::test]
async fn disabling_an_item_only_cancels_it() {
    let rig = rig_at(morning());
    sync(&rig, day()).await;
    rig.store.clear_ops().await;

    let mut without_asr = day();
    without_asr.item_settings.get_mut("Asr").unwrap().enabled = false;
    let outcome = sync(&rig, without_asr).await;

    assert_eq!(outcome, SyncOutcome::UpToDate { cancelled: 1 });
    assert_eq!(rig.store.ops().await, vec![StoreOp::Cancel("prayer-Asr".into())]);
    assert!(rig.store.get("prayer-Asr").await.is_none());
}

#[tokio::test]
async fn offset_into_the_past_rolls_to_tomorrow() {
    let now = Tz::UTC.with_ymd_and_hms(2026, 3, 10, 5, 5, 0).unwrap();
    let rig = rig_at(now);
    let desired = DesiredState::new("en")
        .with_time("Fajr", "05:12")
        .with_item("Fajr", ItemSettings::enabled().with_offset(-10));
    sync(&rig, desired).await;

    let fajr = rig.store.get("prayer-Fajr").await.unwrap();
    let expected = Tz::UTC.with_ymd_and_hms(2026, 3, 11, 5, 2, 0).unwrap();
    assert_eq!(fajr.trigger.timestamp_ms, expected.timestamp_millis());
}

#[tokio::test]
async fn vibration_change_replaces_channels() {
    let rig = rig_at(morning());
    sync(&rig, day()).await;
    assert_eq!(
        rig.store.channel_ids().await,
        vec!["prayer-vibration-on".to_string(), "reminder-vibration-on".to_string()]
    );
    rig.store.clear_ops().await;

    let mut quiet = day();
    quiet.global.vibration = VibrationMode::Off;
    let outcome = sync(&rig, quiet).await;

    assert_eq!(outcome.scheduled_count(), 4);
    assert_eq!(
        rig.store.channel_ids().await,
        vec!["prayer-vibration-off".to_string(), "reminder-vibration-off".to_string()]
    );
    let ops = rig.store.ops().await;
    assert!(ops.contains(&StoreOp::DeleteChannel("prayer-vibration-on".into())));
    assert!(ops.contains(&StoreOp::DeleteChannel("reminder-vibration-on".into())));
    for item in rig.store.pending().await {
        assert_eq!(item.metadata.vibration, VibrationMode::Off);
        assert!(item.channel_id.unwrap().ends_with("-vibration-off"));
    }
}

#[tokio::test]
async fn invalid_time_is_skipped_and_stays_skipped() {
    let rig = rig_at(morning());
    let mut desired = day();
    desired.prayer_times.insert("Dhuhr".into(), "abc".into());

    let outcome = sync(&rig, desired.clone()).await;
    assert_eq!(outcome.scheduled_count(), 3);
    assert!(rig.store.get("prayer-Dhuhr").await.is_none());
    assert!(rig.store.get("prayer-Asr").await.is_some());

    rig.store.clear_ops().await;
    assert_eq!(sync(&rig, desired).await, SyncOutcome::UpToDate { cancelled: 0 });
    assert!(rig.store.ops().await.is_empty());
}

#[tokio::test]
async fn delivered_daily_item_does_not_cause_thrash() {
    let rig = rig_at(morning());
    sync(&rig, day()).await;

    // Fajr fires at 05:02; the OS moves the repeating trigger to tomorrow.
    rig.clock.set(Tz::UTC.with_ymd_and_hms(2026, 3, 10, 5, 3, 0).unwrap());
    rig.store.deliver("prayer-Fajr").await.unwrap();
    rig.store.clear_ops().await;

    assert_eq!(sync(&rig, day()).await.scheduled_count(), 0);
    assert!(rig.store.ops().await.is_empty());
}

#[tokio::test]
async fn sync_without_published_state_does_nothing() {
    let rig = rig_at(morning());
    assert!(rig.engine.sync_now().await.is_none());
}

#[tokio::test]
async fn listing_failure_is_reported_and_recovers() {
    let rig = rig_at(morning());
    let mut events = rig.engine.subscribe_events();
    rig.store.set_listing_fails(true).await;
    rig.engine.update_desired(day());
    assert!(rig.engine.sync_now().await.unwrap().is_err());
    assert!(matches!(events.recv().await.unwrap(), EngineEvent::SyncFailed { .. }));

    rig.store.set_listing_fails(false).await;
    assert_eq!(sync(&rig, day()).await.scheduled_count(), 4);
}
