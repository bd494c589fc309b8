//! Exclusive control of the single alert sound session.

use crate::common::SessionId;
use crate::error::SoundError;
use crate::platform::{AudioBackend, AudioTrack};
use slotmap::SlotMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Owns the one audio session that may be playing at any time.
///
/// Cloning yields another handle to the same session slot. Starting a new
/// sound always releases the previous one first, under the same lock, so two
/// sessions can never overlap.
#[derive(Clone)]
pub struct SoundPlayer {
    backend: Arc<dyn AudioBackend>,
    sessions: Arc<Mutex<SlotMap<SessionId, Box<dyn AudioTrack>>>>,
    auto_stop: Duration,
}

impl SoundPlayer {
    pub fn new(backend: Arc<dyn AudioBackend>, auto_stop: Duration) -> Self {
        Self {
            backend,
            sessions: Arc::new(Mutex::new(SlotMap::with_key())),
            auto_stop,
        }
    }

    /// Plays `file` once at `volume`.
    ///
    /// Does nothing and returns `Ok(None)` when there is no file or the volume
    /// is not positive. The session ends by itself when the clip finishes,
    /// fails, or runs longer than the auto-stop limit.
    pub async fn start(&self, file: Option<&str>, volume: f32) -> Result<Option<SessionId>, SoundError> {
        let Some(file) = file.filter(|f| !f.is_empty()) else {
            debug!("no sound file, staying silent");
            return Ok(None);
        };
        if volume <= 0.0 {
            debug!(volume, "volume muted, staying silent");
            return Ok(None);
        }

        let mut sessions = self.sessions.lock().await;
        Self::release_all(&mut sessions).await;

        let mut track = self.backend.load(file).await?;
        track.set_volume(volume.clamp(0.0, 1.0));
        let done = match track.play().await {
            Ok(done) => done,
            Err(e) => {
                track.release().await;
                return Err(e);
            }
        };

        let id = sessions.insert(track);
        drop(sessions);
        info!(file, volume, "sound started");

        let player = self.clone();
        let auto_stop = self.auto_stop;
        tokio::spawn(async move {
            tokio::select! {
                finished = done => match finished {
                    Ok(true) => debug!("sound finished"),
                    Ok(false) | Err(_) => warn!("sound playback failed"),
                },
                _ = tokio::time::sleep(auto_stop) => {
                    info!(?auto_stop, "sound auto-stopped");
                }
            }
            player.stop_session(id).await;
        });

        Ok(Some(id))
    }

    /// Stops whatever is playing. Safe to call when nothing is.
    pub async fn stop(&self) {
        let mut sessions = self.sessions.lock().await;
        Self::release_all(&mut sessions).await;
    }

    /// The currently playing session, if any.
    pub async fn active_session(&self) -> Option<SessionId> {
        self.sessions.lock().await.keys().next()
    }

    /// Stops `id` only if it is still the active session.
    async fn stop_session(&self, id: SessionId) {
        let mut sessions = self.sessions.lock().await;
        if let Some(mut track) = sessions.remove(id) {
            track.release().await;
            debug!("sound session released");
        }
    }

    async fn release_all(sessions: &mut SlotMap<SessionId, Box<dyn AudioTrack>>) {
        for (_, mut track) in sessions.drain() {
            track.release().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::{AudioOp, SimulatedAudio};

    const LONG: Duration = Duration::from_secs(3600);

    fn player(clip: Duration, auto_stop: Duration) -> (SoundPlayer, SimulatedAudio) {
        let audio = SimulatedAudio::new(clip);
        (SoundPlayer::new(Arc::new(audio.clone()), auto_stop), audio)
    }

    #[tokio::test]
    async fn silent_without_file_or_volume() {
        let (player, audio) = player(LONG, LONG);
        assert_eq!(player.start(None, 1.0).await.unwrap(), None);
        assert_eq!(player.start(Some("adhan.mp3"), 0.0).await.unwrap(), None);
        assert!(audio.log().is_empty());
        assert!(player.active_session().await.is_none());
    }

    #[tokio::test]
    async fn new_start_releases_previous_session() {
        let (player, audio) = player(LONG, LONG);
        let a = player.start(Some("a.mp3"), 1.0).await.unwrap().unwrap();
        let b = player.start(Some("b.mp3"), 0.5).await.unwrap().unwrap();

        assert_ne!(a, b);
        assert_eq!(player.active_session().await, Some(b));
        let log = audio.log();
        let released_a = log.iter().position(|op| *op == AudioOp::Release("a.mp3".into()));
        let loaded_b = log.iter().position(|op| *op == AudioOp::Load("b.mp3".into()));
        assert!(released_a.unwrap() < loaded_b.unwrap());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (player, audio) = player(LONG, LONG);
        player.start(Some("a.mp3"), 1.0).await.unwrap();
        player.stop().await;
        player.stop().await;
        assert!(player.active_session().await.is_none());
        let releases = audio
            .log()
            .into_iter()
            .filter(|op| matches!(op, AudioOp::Release(_)))
            .count();
        assert_eq!(releases, 1);
    }

    #[tokio::test]
    async fn volume_is_clamped() {
        let (player, audio) = player(LONG, LONG);
        player.start(Some("a.mp3"), 3.0).await.unwrap();
        assert!(audio.log().contains(&AudioOp::Volume("a.mp3".into(), 1.0)));
    }

    #[tokio::test]
    async fn load_failure_leaves_nothing_playing() {
        let (player, audio) = player(LONG, LONG);
        audio.mark_missing("gone.mp3");
        assert!(player.start(Some("gone.mp3"), 1.0).await.is_err());
        assert!(player.active_session().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn session_ends_when_clip_completes() {
        let (player, _audio) = player(Duration::from_secs(30), LONG);
        player.start(Some("a.mp3"), 1.0).await.unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(player.active_session().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn auto_stop_bounds_playback() {
        let (player, audio) = player(LONG, Duration::from_secs(60));
        player.start(Some("a.mp3"), 1.0).await.unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(player.active_session().await.is_none());
        assert!(audio.log().contains(&AudioOp::Release("a.mp3".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_does_not_stop_successor() {
        let (player, _audio) = player(Duration::from_secs(30), LONG);
        player.start(Some("a.mp3"), 1.0).await.unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;
        let b = player.start(Some("b.mp3"), 1.0).await.unwrap();
        // a's clip would have ended here.
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(player.active_session().await, b);
    }
}
