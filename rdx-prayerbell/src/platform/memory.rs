//! In-memory platform bindings.
//!
//! These back the interactive shell and the test suite. The store records
//! every mutating call so callers can assert on exactly what a sync pass wrote.

use super::{AudioBackend, AudioTrack, Channel, NotificationStore, PermissionProvider};
use crate::common::{Platform, RepeatFrequency};
use crate::error::{PlatformError, SoundError};
use crate::model::NotificationItem;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};

/// A mutating call observed by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Schedule(String),
    Cancel(String),
    CancelDisplayed(String),
    CreateChannel(String),
    DeleteChannel(String),
}

#[derive(Default)]
struct StoreState {
    scheduled: BTreeMap<String, NotificationItem>,
    displayed: BTreeMap<String, NotificationItem>,
    channels: BTreeMap<String, Channel>,
    ops: Vec<StoreOp>,
    failing_ids: HashSet<String>,
    listing_fails: bool,
}

/// A notification store held entirely in memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every mutating call since creation or the last [`clear_ops`](Self::clear_ops).
    pub async fn ops(&self) -> Vec<StoreOp> {
        self.state.lock().await.ops.clone()
    }

    pub async fn clear_ops(&self) {
        self.state.lock().await.ops.clear();
    }

    pub async fn pending(&self) -> Vec<NotificationItem> {
        self.state.lock().await.scheduled.values().cloned().collect()
    }

    pub async fn get(&self, id: &str) -> Option<NotificationItem> {
        self.state.lock().await.scheduled.get(id).cloned()
    }

    pub async fn displayed(&self) -> Vec<NotificationItem> {
        self.state.lock().await.displayed.values().cloned().collect()
    }

    pub async fn channel_ids(&self) -> Vec<String> {
        self.state.lock().await.channels.keys().cloned().collect()
    }

    /// Makes every later `schedule` call for `id` fail.
    pub async fn fail_schedule_for(&self, id: impl Into<String>) {
        self.state.lock().await.failing_ids.insert(id.into());
    }

    /// Makes `scheduled()` fail until switched back.
    pub async fn set_listing_fails(&self, fails: bool) {
        self.state.lock().await.listing_fails = fails;
    }

    /// Simulates the OS firing a pending notification.
    ///
    /// The item becomes displayed. One-shot triggers leave the pending set;
    /// repeating ones move on to their next occurrence.
    pub async fn deliver(&self, id: &str) -> Option<NotificationItem> {
        const DAY_MS: i64 = 86_400_000;
        let mut state = self.state.lock().await;
        let item = state.scheduled.get(id).cloned()?;
        match item.trigger.repeat {
            RepeatFrequency::None => {
                state.scheduled.remove(id);
            }
            RepeatFrequency::Daily | RepeatFrequency::Weekly => {
                let step = if item.trigger.repeat == RepeatFrequency::Daily {
                    DAY_MS
                } else {
                    7 * DAY_MS
                };
                if let Some(pending) = state.scheduled.get_mut(id) {
                    pending.trigger.timestamp_ms += step;
                }
            }
        }
        state.displayed.insert(item.id.clone(), item.clone());
        Some(item)
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn scheduled(&self) -> Result<Vec<NotificationItem>, PlatformError> {
        let state = self.state.lock().await;
        if state.listing_fails {
            return Err(PlatformError::Unavailable);
        }
        Ok(state.scheduled.values().cloned().collect())
    }

    async fn schedule(&self, item: NotificationItem) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        state.ops.push(StoreOp::Schedule(item.id.clone()));
        if state.failing_ids.contains(&item.id) {
            return Err(PlatformError::rejected("schedule", "rejected by store"));
        }
        state.scheduled.insert(item.id.clone(), item);
        Ok(())
    }

    async fn cancel(&self, id: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        state.ops.push(StoreOp::Cancel(id.to_string()));
        state.scheduled.remove(id);
        state.displayed.remove(id);
        Ok(())
    }

    async fn cancel_displayed(&self, id: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        state.ops.push(StoreOp::CancelDisplayed(id.to_string()));
        state.displayed.remove(id);
        Ok(())
    }

    async fn channels(&self) -> Result<Vec<String>, PlatformError> {
        Ok(self.state.lock().await.channels.keys().cloned().collect())
    }

    async fn create_channel(&self, channel: &Channel) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        state.ops.push(StoreOp::CreateChannel(channel.id.clone()));
        state.channels.insert(channel.id.clone(), channel.clone());
        Ok(())
    }

    async fn delete_channel(&self, id: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        state.ops.push(StoreOp::DeleteChannel(id.to_string()));
        state.channels.remove(id);
        Ok(())
    }
}

/// Permission answers that can be flipped at runtime.
#[derive(Debug)]
pub struct StaticPermissions {
    notifications: AtomicBool,
    exact_alarms: AtomicBool,
    platform: Platform,
}

impl StaticPermissions {
    pub fn granted(platform: Platform) -> Self {
        Self {
            notifications: AtomicBool::new(true),
            exact_alarms: AtomicBool::new(true),
            platform,
        }
    }

    pub fn set_notifications(&self, allowed: bool) {
        self.notifications.store(allowed, Ordering::SeqCst);
    }

    pub fn set_exact_alarms(&self, allowed: bool) {
        self.exact_alarms.store(allowed, Ordering::SeqCst);
    }
}

#[async_trait]
impl PermissionProvider for StaticPermissions {
    async fn notifications_allowed(&self) -> Result<bool, PlatformError> {
        Ok(self.notifications.load(Ordering::SeqCst))
    }

    async fn exact_alarms_allowed(&self) -> Result<bool, PlatformError> {
        Ok(self.exact_alarms.load(Ordering::SeqCst))
    }

    fn platform(&self) -> Platform {
        self.platform
    }
}

/// A lifecycle step observed by [`SimulatedAudio`].
#[derive(Debug, Clone, PartialEq)]
pub enum AudioOp {
    Load(String),
    Volume(String, f32),
    Play(String),
    Release(String),
}

/// An audio backend whose clips "play" for a fixed duration.
#[derive(Clone)]
pub struct SimulatedAudio {
    clip_length: Duration,
    missing: Arc<std::sync::Mutex<HashSet<String>>>,
    log: Arc<std::sync::Mutex<Vec<AudioOp>>>,
}

impl SimulatedAudio {
    pub fn new(clip_length: Duration) -> Self {
        Self {
            clip_length,
            missing: Arc::default(),
            log: Arc::default(),
        }
    }

    /// Makes loading `file` fail as if the asset were absent.
    pub fn mark_missing(&self, file: impl Into<String>) {
        if let Ok(mut missing) = self.missing.lock() {
            missing.insert(file.into());
        }
    }

    pub fn log(&self) -> Vec<AudioOp> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    fn record(log: &std::sync::Mutex<Vec<AudioOp>>, op: AudioOp) {
        if let Ok(mut log) = log.lock() {
            log.push(op);
        }
    }
}

#[async_trait]
impl AudioBackend for SimulatedAudio {
    async fn load(&self, file: &str) -> Result<Box<dyn AudioTrack>, SoundError> {
        let missing = self
            .missing
            .lock()
            .map(|missing| missing.contains(file))
            .unwrap_or(false);
        if missing {
            return Err(SoundError::Load {
                file: file.to_string(),
                reason: "asset not found".to_string(),
            });
        }
        Self::record(&self.log, AudioOp::Load(file.to_string()));
        Ok(Box::new(SimulatedTrack {
            file: file.to_string(),
            clip_length: self.clip_length,
            log: self.log.clone(),
        }))
    }
}

struct SimulatedTrack {
    file: String,
    clip_length: Duration,
    log: Arc<std::sync::Mutex<Vec<AudioOp>>>,
}

#[async_trait]
impl AudioTrack for SimulatedTrack {
    fn set_volume(&mut self, volume: f32) {
        SimulatedAudio::record(&self.log, AudioOp::Volume(self.file.clone(), volume));
    }

    async fn play(&mut self) -> Result<oneshot::Receiver<bool>, SoundError> {
        SimulatedAudio::record(&self.log, AudioOp::Play(self.file.clone()));
        let (done_tx, done_rx) = oneshot::channel();
        let clip_length = self.clip_length;
        tokio::spawn(async move {
            tokio::time::sleep(clip_length).await;
            done_tx.send(true).ok();
        });
        Ok(done_rx)
    }

    async fn release(&mut self) {
        SimulatedAudio::record(&self.log, AudioOp::Release(self.file.clone()));
    }
}
