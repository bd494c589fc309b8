use anyhow::Result;
use chrono::{Duration as ChronoDuration, NaiveTime, TimeZone};
use chrono_tz::Tz;
use colored::Colorize;
use prayerbell::platform::memory::{MemoryStore, SimulatedAudio, StaticPermissions};
use prayerbell::platform::DefaultLabels;
use prayerbell::prelude::*;
use prayerbell::{ENGINE_NAME, VERSION as LIB_VERSION};
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct MyHighlighter;

impl Highlighter for MyHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            Cow::Owned(format!("{} {}", command.yellow().bold(), rest.yellow()))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }
    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    let rule = "-".repeat(72);
    println!("{}", "  prayershell".cyan().bold());
    println!("{}", rule.dimmed());
    println!("  Shell   v{:<8} Library   v{:<8}", SHELL_VERSION, LIB_VERSION);
    println!(
        "{}",
        "  Distributed under the MIT OR Apache-2.0 license. Use at your own risk.".dimmed()
    );
    println!("{}", rule.dimmed());
}

/// Everything the shell pokes at directly, next to the engine itself.
struct Session {
    engine: PrayerBellEngine,
    store: MemoryStore,
    permissions: Arc<StaticPermissions>,
    clock: ManualClock,
    desired: DesiredState,
}

impl Session {
    fn publish(&self) {
        self.engine.update_desired(self.desired.clone());
    }

    fn settings_mut(&mut self, name: &str) -> &mut ItemSettings {
        self.desired.item_settings.entry(name.to_string()).or_default()
    }
}

/// A clock the user can move around, starting from the wall time in `timezone`.
fn shell_clock(timezone: Tz) -> ManualClock {
    ManualClock::new(SystemClock::new(timezone).now())
}

fn starter_state() -> DesiredState {
    DesiredState::new("en")
        .with_time("Fajr", "05:12")
        .with_time("Sunrise", "06:40")
        .with_time("Dhuhr", "12:10")
        .with_time("Asr", "15:30")
        .with_time("Maghrib", "18:20")
        .with_time("Isha", "19:45")
        .with_item("Fajr", ItemSettings::enabled().with_sound("adhan.mp3"))
        .with_item("Dhuhr", ItemSettings::enabled().with_sound("adhan.mp3"))
        .with_item("Maghrib", ItemSettings::enabled().with_sound("adhan.mp3"))
}

fn spawn_event_listener(engine: &PrayerBellEngine) {
    let mut events = engine.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("\n<-- [ENGINE] {:?}", event);
        }
    });
}

fn on_off(arg: Option<&&str>) -> Option<bool> {
    match arg.copied() {
        Some("on") => Some(true),
        Some("off") => Some(false),
        _ => None,
    }
}

/// Builds the event the OS would hand over for a displayed notification.
async fn event_for(store: &MemoryStore, id: &str, event_type: NotificationEventType) -> Option<NotificationEvent> {
    let item = store.displayed().await.into_iter().find(|item| item.id == id)?;
    Some(NotificationEvent::new(
        event_type,
        DeliveredNotification {
            id: item.id,
            metadata: Some(item.metadata),
        },
    ))
}

async fn dispatch(session: &Session, event: NotificationEvent, background: bool) {
    let outcome = if background {
        session.engine.on_background_event(event).await
    } else {
        session.engine.on_foreground_event(event).await
    };
    match outcome {
        Ok(outcome) => println!("--> {:?}", outcome),
        Err(e) => println!("Error: {}", e),
    }
}

async fn print_pending(session: &Session) {
    let pending = session.store.pending().await;
    if pending.is_empty() {
        println!("No pending notifications.");
    }
    let timezone = session.engine.config().timezone;
    for item in pending {
        let at = timezone
            .timestamp_millis_opt(item.trigger.timestamp_ms)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "  {:<28} {}  {:?}{}  vol {:.2}  {}",
            item.id.cyan(),
            at,
            item.trigger.repeat,
            if item.trigger.exact { "" } else { " (inexact)" },
            item.metadata.volume,
            item.channel_id.as_deref().unwrap_or("-").dimmed(),
        );
    }
    for item in session.store.displayed().await {
        println!("  {:<28} {}", item.id.yellow(), "displayed".dimmed());
    }
}

fn print_help() {
    println!("Available commands:");
    println!("  time <NAME> <HH:MM>          - Sets an upstream time (any text is accepted).");
    println!("  enable <NAME> [OFFSET]       - Enables an item, optionally offset in minutes.");
    println!("  disable <NAME>               - Disables an item.");
    println!("  sound <NAME> <FILE|none>     - Sets the alert sound for an item.");
    println!("  volume <0..1>                - Sets the global volume.");
    println!("  vibration <on|off>           - Sets the global vibration mode.");
    println!("  snooze <MINUTES>             - Sets the global snooze duration.");
    println!("  lang <CODE>                  - Sets the display language.");
    println!("  now [HH:MM | +MINUTES]       - Shows or moves the shell clock.");
    println!("  sync                         - Runs a sync pass right away.");
    println!("  list                         - Shows pending and displayed notifications.");
    println!("  channels                     - Shows the notification channels.");
    println!("  deliver <ID> [bg]            - Fires a pending notification.");
    println!("  press <ID> <ACTION> [bg]     - Presses an action (dismiss, snooze, ok).");
    println!("  tap <ID> | swipe <ID>        - Taps or swipes away a displayed notification.");
    println!("  permission <notify|exact> <on|off>");
    println!("  stop                         - Stops the playing sound.");
    println!("  exit                         - Quits the shell.");
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config_path = env::args().nth(1).map(PathBuf::from);
    let config = PrayerBellConfig::load(config_path.as_deref())?;

    let store = MemoryStore::new();
    let permissions = Arc::new(StaticPermissions::granted(Platform::Android));
    let clock = shell_clock(config.timezone);
    let bindings = PlatformBindings {
        store: Arc::new(store.clone()),
        permissions: permissions.clone(),
        audio: Arc::new(SimulatedAudio::new(Duration::from_secs(30))),
        labels: Arc::new(DefaultLabels),
        clock: Arc::new(clock.clone()),
    };
    let engine = PrayerBellEngine::new(config, bindings);
    spawn_event_listener(&engine);

    info!("Spawning {} in the background...", ENGINE_NAME.cyan());
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let runner = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .run_until(async move {
                    shutdown_rx.await.ok();
                })
                .await
        })
    };

    let mut session = Session {
        engine,
        store,
        permissions,
        clock,
        desired: starter_state(),
    };
    session.publish();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut rl = Editor::new()?;
    rl.set_helper(Some(MyHighlighter));

    println!("{} is running. Type 'help' for commands or 'exit' to quit.", ENGINE_NAME.cyan());

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(_) => {
                println!("Exiting prayershell...");
                break;
            }
        };
        rl.add_history_entry(line.as_str())?;
        let args = line.split_whitespace().collect::<Vec<_>>();
        let Some(command) = args.first() else {
            continue;
        };

        match *command {
            "time" => match (args.get(1), args.get(2)) {
                (Some(name), Some(_)) => {
                    let raw = args[2..].join(" ");
                    session.desired.prayer_times.insert(name.to_string(), raw);
                    session.publish();
                }
                _ => println!("Usage: time <NAME> <HH:MM>"),
            },
            "enable" => match args.get(1) {
                Some(name) => {
                    let offset = match args.get(2).map(|s| s.parse::<i32>()) {
                        Some(Ok(offset)) => Some(offset),
                        Some(Err(_)) => {
                            println!("Error: offset must be a whole number of minutes.");
                            continue;
                        }
                        None => None,
                    };
                    let settings = session.settings_mut(name);
                    settings.enabled = true;
                    if let Some(offset) = offset {
                        settings.offset_minutes = offset;
                    }
                    session.publish();
                }
                None => println!("Usage: enable <NAME> [OFFSET]"),
            },
            "disable" => match args.get(1) {
                Some(name) => {
                    session.settings_mut(name).enabled = false;
                    session.publish();
                }
                None => println!("Usage: disable <NAME>"),
            },
            "sound" => match (args.get(1), args.get(2)) {
                (Some(name), Some(file)) => {
                    session.settings_mut(name).sound = match *file {
                        "none" => None,
                        file => Some(file.to_string()),
                    };
                    session.publish();
                }
                _ => println!("Usage: sound <NAME> <FILE|none>"),
            },
            "volume" => match args.get(1).and_then(|v| v.parse::<f32>().ok()) {
                Some(volume) if (0.0..=1.0).contains(&volume) => {
                    session.desired.global.volume = volume;
                    session.publish();
                }
                _ => println!("Usage: volume <0..1>"),
            },
            "vibration" => match on_off(args.get(1)) {
                Some(on) => {
                    session.desired.global.vibration = if on { VibrationMode::On } else { VibrationMode::Off };
                    session.publish();
                }
                None => println!("Usage: vibration <on|off>"),
            },
            "snooze" => match args.get(1).and_then(|m| m.parse::<u32>().ok()) {
                Some(minutes) => {
                    session.desired.global.snooze_minutes = minutes;
                    session.publish();
                }
                None => println!("Usage: snooze <MINUTES>"),
            },
            "lang" => match args.get(1) {
                Some(language) => {
                    session.desired.language = language.to_string();
                    session.publish();
                }
                None => println!("Usage: lang <CODE>"),
            },
            "now" => {
                match args.get(1) {
                    None => {}
                    Some(arg) if arg.starts_with('+') => match arg[1..].parse::<i64>() {
                        Ok(minutes) => session.clock.advance(ChronoDuration::minutes(minutes)),
                        Err(_) => println!("Error: '{}' is not a number of minutes.", arg),
                    },
                    Some(arg) => match NaiveTime::parse_from_str(arg, "%H:%M") {
                        Ok(time) => {
                            let today = session.clock.now().date_naive().and_time(time);
                            match session.engine.config().timezone.from_local_datetime(&today).earliest() {
                                Some(at) => session.clock.set(at),
                                None => println!("Error: {} does not exist today.", arg),
                            }
                        }
                        Err(_) => println!("Usage: now [HH:MM | +MINUTES]"),
                    },
                }
                println!("--> {}", session.clock.now().format("%Y-%m-%d %H:%M:%S %Z"));
            }
            "sync" => match session.engine.sync_now().await {
                Some(Ok(outcome)) => println!("--> {:?}", outcome),
                Some(Err(e)) => println!("Error: {}", e),
                None => println!("Nothing published yet."),
            },
            "list" => print_pending(&session).await,
            "channels" => {
                for id in session.store.channel_ids().await {
                    println!("  {}", id);
                }
            }
            "deliver" => match args.get(1) {
                Some(id) => match session.store.deliver(id).await {
                    Some(item) => {
                        println!("<-- [OS] {} ({})", item.label.yellow(), item.body);
                        let event = NotificationEvent::new(
                            NotificationEventType::Delivered,
                            DeliveredNotification {
                                id: item.id,
                                metadata: Some(item.metadata),
                            },
                        );
                        dispatch(&session, event, args.get(2) == Some(&"bg")).await;
                    }
                    None => println!("Error: no pending notification '{}'.", id),
                },
                None => println!("Usage: deliver <ID> [bg]"),
            },
            "press" => match (args.get(1), args.get(2)) {
                (Some(id), Some(action)) => {
                    let event_type = NotificationEventType::ActionPress {
                        action_id: action.to_string(),
                    };
                    match event_for(&session.store, id, event_type).await {
                        Some(event) => dispatch(&session, event, args.get(3) == Some(&"bg")).await,
                        None => println!("Error: '{}' is not displayed.", id),
                    }
                }
                _ => println!("Usage: press <ID> <ACTION> [bg]"),
            },
            "tap" | "swipe" => match args.get(1) {
                Some(id) => {
                    let event_type = if *command == "tap" {
                        NotificationEventType::Press
                    } else {
                        NotificationEventType::Dismissed
                    };
                    match event_for(&session.store, id, event_type).await {
                        Some(event) => dispatch(&session, event, false).await,
                        None => println!("Error: '{}' is not displayed.", id),
                    }
                }
                None => println!("Usage: {} <ID>", command),
            },
            "permission" => match (args.get(1).copied(), on_off(args.get(2))) {
                (Some("notify"), Some(allowed)) => {
                    session.permissions.set_notifications(allowed);
                    println!("--> Notification permission {}.", if allowed { "granted" } else { "revoked" });
                }
                (Some("exact"), Some(allowed)) => {
                    session.permissions.set_exact_alarms(allowed);
                    println!("--> Exact alarms {}.", if allowed { "allowed" } else { "denied" });
                }
                _ => println!("Usage: permission <notify|exact> <on|off>"),
            },
            "stop" => {
                session.engine.stop_sound().await;
                println!("--> Sound stopped.");
            }
            "help" => print_help(),
            "exit" => break,
            _ => println!("Unknown command: '{}'. Type 'help'.", line),
        }
    }

    shutdown_tx.send(()).ok();
    runner.await?;
    Ok(())
}
