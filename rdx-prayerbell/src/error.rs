//! Error types for the Prayerbell engine.

use thiserror::Error;

/// Top-level error type for scheduling and dispatch.
#[derive(Debug, Error)]
pub enum PrayerBellError {
    /// A time string did not match `H:mm` / `HH:mm`.
    #[error("invalid time format: {0:?}")]
    InvalidTimeFormat(String),

    /// The OS rejected a create or cancel call for one notification.
    #[error("failed to schedule {id}: {source}")]
    SchedulingFailure {
        id: String,
        #[source]
        source: PlatformError,
    },

    /// A required device permission is missing.
    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),

    /// No prayer times are available for the current day.
    #[error("no prayer times available")]
    MissingUpstreamData,

    /// A platform call outside the per-item loop failed.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// The audio backend failed.
    #[error(transparent)]
    Sound(#[from] SoundError),
}

/// Failure reported by a notification or permission backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("{operation} rejected: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },

    #[error("notification backend unavailable")]
    Unavailable,
}

impl PlatformError {
    pub fn rejected(operation: &'static str, reason: impl Into<String>) -> Self {
        PlatformError::Rejected {
            operation,
            reason: reason.into(),
        }
    }
}

/// Failure reported by an audio backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SoundError {
    #[error("failed to load sound {file:?}: {reason}")]
    Load { file: String, reason: String },

    #[error("playback failed: {0}")]
    Playback(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PrayerBellError>;
