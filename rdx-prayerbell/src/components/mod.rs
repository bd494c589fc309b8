//! Contains the building blocks of the notification engine.
//!
//! The reconciler decides, the scheduler writes, the dispatcher reacts to what
//! the OS reports back, and the sound player owns the one audio session. The
//! `PrayerBellEngine` wires these together and drives them.

pub mod dispatcher;
pub mod reconciler;
pub mod scheduler;
pub mod sound;
pub mod watcher;
