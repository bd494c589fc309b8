//! Wall-clock access and next-occurrence trigger arithmetic.
//!
//! Every trigger the engine writes is derived from a local `HH:mm` string and a
//! signed minute offset. The computation here is deterministic for a given
//! `now`, which lets the reconciler recompute a trigger and compare it to the
//! one already scheduled down to the millisecond.

use crate::error::{PrayerBellError, Result};
use chrono::offset::LocalResult;
use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::{Arc, RwLock};

/// The single source of "now" for the engine.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Tz>;
}

/// Reads the system clock and projects it into a configured time zone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    timezone: Tz,
}

impl SystemClock {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.timezone)
    }
}

/// A clock that only moves when told to. Cloned handles share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Tz>>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Tz>) -> Self {
        Self {
            now: Arc::new(RwLock::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Tz>) {
        match self.now.write() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }

    pub fn advance(&self, by: Duration) {
        let next = self.now() + by;
        self.set(next);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Tz> {
        match self.now.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Parses an upstream `H:mm` / `HH:mm` string.
///
/// All whitespace is stripped first, including the non-breaking spaces some
/// upstream responses embed.
pub fn parse_time(raw: &str) -> Result<NaiveTime> {
    let normalized: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let invalid = || PrayerBellError::InvalidTimeFormat(raw.to_string());

    let (hour, minute) = normalized.split_once(':').ok_or_else(invalid)?;
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(hour) || hour.len() > 2 || !digits(minute) || minute.len() != 2 {
        return Err(invalid());
    }

    let hour: u32 = hour.parse().map_err(|_| invalid())?;
    let minute: u32 = minute.parse().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

/// Resolves the next instant a notification for `time` should fire.
///
/// The time is placed on `now`'s local date, shifted by `offset_minutes`
/// (negative means before), and moved to the next calendar day when the result
/// is not strictly after `now`. Returns `None` for malformed input.
pub fn compute_trigger(time: &str, offset_minutes: i32, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let time = parse_time(time).ok()?;
    let tz = now.timezone();
    let local = now.date_naive().and_time(time) + Duration::minutes(i64::from(offset_minutes));

    let trigger = localize(tz, local)?;
    if trigger > *now {
        return Some(trigger);
    }
    localize(tz, local + Duration::days(1))
}

/// Maps a local wall-clock time to an instant, tolerating DST transitions.
fn localize(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(instant) => Some(instant),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        // Spring-forward gap.
        LocalResult::None => tz.from_local_datetime(&(local + Duration::hours(1))).earliest(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn at(h: u32, m: u32) -> DateTime<Tz> {
        Tz::UTC.with_ymd_and_hms(2026, 3, 10, h, m, 0).unwrap()
    }

    fn tomorrow(h: u32, m: u32) -> DateTime<Tz> {
        Tz::UTC.with_ymd_and_hms(2026, 3, 11, h, m, 0).unwrap()
    }

    #[test]
    fn parses_short_and_padded_hours() {
        assert_eq!(parse_time("5:07").unwrap(), NaiveTime::from_hms_opt(5, 7, 0).unwrap());
        assert_eq!(parse_time("17:45").unwrap(), NaiveTime::from_hms_opt(17, 45, 0).unwrap());
    }

    #[test]
    fn strips_non_breaking_spaces() {
        assert!(parse_time("\u{00A0}05:12 ").is_ok());
        assert!(parse_time("05 :\u{202F}12").is_ok());
    }

    #[test]
    fn rejects_malformed_times() {
        for raw in ["abc", "", "5", "05:1", "005:10", "24:00", "12:60", "05:12 (EET)", "-1:30"] {
            assert!(
                matches!(parse_time(raw), Err(PrayerBellError::InvalidTimeFormat(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn future_time_lands_today() {
        assert_eq!(compute_trigger("13:30", 0, &at(9, 0)), Some(at(13, 30)));
    }

    #[test]
    fn passed_time_rolls_to_tomorrow() {
        assert_eq!(compute_trigger("05:00", 0, &at(9, 0)), Some(tomorrow(5, 0)));
    }

    #[test]
    fn time_equal_to_now_rolls_over() {
        assert_eq!(compute_trigger("09:00", 0, &at(9, 0)), Some(tomorrow(9, 0)));
    }

    #[test]
    fn negative_offset_pushing_into_past_rolls_over() {
        assert_eq!(compute_trigger("05:00", -15, &at(4, 50)), Some(tomorrow(4, 45)));
    }

    #[test]
    fn negative_offset_still_ahead_stays_today() {
        assert_eq!(compute_trigger("05:00", -15, &at(4, 0)), Some(at(4, 45)));
    }

    #[test]
    fn offset_before_fajr_after_reminder_window() {
        let now = at(5, 5);
        assert_eq!(compute_trigger("05:12", -10, &now), Some(tomorrow(5, 2)));
    }

    #[test]
    fn positive_offset_crosses_midnight() {
        let trigger = compute_trigger("23:50", 20, &at(22, 0)).unwrap();
        assert_eq!(trigger, tomorrow(0, 10));
    }

    #[test]
    fn triggers_have_no_sub_minute_component() {
        let now = Tz::UTC.with_ymd_and_hms(2026, 3, 10, 4, 0, 37).unwrap();
        let trigger = compute_trigger("05:00", 0, &now).unwrap();
        assert_eq!(trigger.second(), 0);
        assert_eq!(trigger.timestamp_millis() % 60_000, 0);
    }

    #[test]
    fn recomputation_is_stable() {
        let now = at(3, 0);
        let first = compute_trigger("05:12", -10, &now).unwrap();
        let second = compute_trigger("05:12", -10, &now).unwrap();
        assert_eq!(first.timestamp_millis(), second.timestamp_millis());
    }

    #[test]
    fn spring_forward_gap_resolves_later() {
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        // 2026-03-29 02:30 does not exist in Berlin.
        let now = tz.with_ymd_and_hms(2026, 3, 29, 0, 0, 0).unwrap();
        let trigger = compute_trigger("02:30", 0, &now).unwrap();
        assert_eq!((trigger.hour(), trigger.minute()), (3, 30));
    }

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = ManualClock::new(at(4, 0));
        let other = clock.clone();
        clock.advance(Duration::minutes(50));
        assert_eq!(other.now(), at(4, 50));
    }
}
