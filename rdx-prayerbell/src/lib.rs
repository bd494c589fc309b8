//! # Prayerbell
//!
//! A notification scheduling and reconciliation engine for prayer-time apps.
//!
//! Prayerbell keeps a set of future-dated local notifications inside an
//! OS-owned notification store in line with the app's prayer times and
//! settings, and drives what happens when those notifications are delivered
//! and acted on.
//!
//! ## Core Concepts
//!
//! - **DesiredState**: A snapshot of today's times, per-item preferences and
//!   global settings. The host republishes it whenever any input changes.
//! - **Reconciliation**: A pure diff between the desired state and what the OS
//!   reports as scheduled. A pass only rewrites the store when something has
//!   genuinely drifted, so repeated syncs are free.
//! - **No local ledger**: The OS store is the only record of what is pending.
//!   Every notification embeds the metadata needed to handle it later.
//! - **Event-Driven**: Delivery and user actions arrive as `NotificationEvent`s
//!   through a foreground or a background entry point and run through the same
//!   state machine.
//! - **Exclusive sound**: At most one alert sound plays at a time.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use prayerbell::prelude::*;
//! use prayerbell::platform::memory::{MemoryStore, SimulatedAudio, StaticPermissions};
//! use prayerbell::platform::DefaultLabels;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // 1. Create a default configuration.
//!     let config = PrayerBellConfig::default();
//!
//!     // 2. Bind the platform. A real app supplies OS-backed implementations.
//!     let bindings = PlatformBindings {
//!         store: Arc::new(MemoryStore::new()),
//!         permissions: Arc::new(StaticPermissions::granted(Platform::Android)),
//!         audio: Arc::new(SimulatedAudio::new(Duration::from_secs(5))),
//!         labels: Arc::new(DefaultLabels),
//!         clock: Arc::new(SystemClock::new(config.timezone)),
//!     };
//!
//!     // 3. Create the engine and publish the desired state.
//!     let engine = PrayerBellEngine::new(config, bindings);
//!     engine.update_desired(
//!         DesiredState::new("en")
//!             .with_time("Fajr", "05:12")
//!             .with_item("Fajr", ItemSettings::enabled().with_offset(-10)),
//!     );
//!
//!     // 4. Run the engine. It will shut down on Ctrl+C.
//!     engine.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Prayerbell Engine";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Declare all the modules in the crate.
pub mod common;
pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod model;
pub mod platform;
pub mod time;

/// A prelude module for easy importing of the most common Prayerbell types.
pub mod prelude {
    pub use crate::common::{ItemKind, Platform, RepeatFrequency, SessionId, VibrationMode};
    pub use crate::components::dispatcher::DispatchOutcome;
    pub use crate::components::scheduler::{SkipReason, SyncOutcome};
    pub use crate::config::PrayerBellConfig;
    pub use crate::engine::{PlatformBindings, PrayerBellEngine};
    pub use crate::error::PrayerBellError;
    pub use crate::events::{
        DeliveredNotification, EngineEvent, EventOrigin, NotificationEvent, NotificationEventType,
    };
    pub use crate::model::{
        DesiredState, ItemSettings, NotifSettings, NotificationItem, NotificationMetadata,
    };
    pub use crate::time::{compute_trigger, Clock, ManualClock, SystemClock};
}
