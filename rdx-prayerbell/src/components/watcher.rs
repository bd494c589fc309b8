//! Watches the clock for local calendar-date changes.

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;

/// Remembers the last local date seen and reports when it changes.
///
/// After midnight the previous day's triggers have fired and upstream times
/// are refreshed, so the engine runs a fresh sync pass on every change.
#[doc(hidden)]
pub(crate) struct DayWatcher {
    last_known_date: NaiveDate,
}

impl DayWatcher {
    /// Creates a new `DayWatcher` anchored at `now`.
    pub(crate) fn new(now: &DateTime<Tz>) -> Self {
        Self {
            last_known_date: now.date_naive(),
        }
    }

    /// Returns the new date if `now` falls on a different local day.
    pub(crate) fn observe(&mut self, now: &DateTime<Tz>) -> Option<NaiveDate> {
        let current_date = now.date_naive();
        if current_date == self.last_known_date {
            return None;
        }
        self.last_known_date = current_date;
        Some(current_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reports_each_date_change_once() {
        let tz: Tz = "Asia/Karachi".parse().unwrap();
        let mut watcher = DayWatcher::new(&tz.with_ymd_and_hms(2026, 3, 10, 23, 58, 0).unwrap());

        assert_eq!(watcher.observe(&tz.with_ymd_and_hms(2026, 3, 10, 23, 59, 0).unwrap()), None);
        let next = tz.with_ymd_and_hms(2026, 3, 11, 0, 0, 30).unwrap();
        assert_eq!(watcher.observe(&next), NaiveDate::from_ymd_opt(2026, 3, 11));
        assert_eq!(watcher.observe(&next), None);
    }

    #[test]
    fn uses_local_not_utc_date() {
        let tz: Tz = "Asia/Karachi".parse().unwrap();
        // 20:30 UTC on the 10th is already the 11th in Karachi (UTC+5).
        let before = tz.with_ymd_and_hms(2026, 3, 10, 23, 0, 0).unwrap();
        let mut watcher = DayWatcher::new(&before);
        let after = chrono::Utc
            .with_ymd_and_hms(2026, 3, 10, 20, 30, 0)
            .unwrap()
            .with_timezone(&tz);
        assert_eq!(watcher.observe(&after), NaiveDate::from_ymd_opt(2026, 3, 11));
    }
}
