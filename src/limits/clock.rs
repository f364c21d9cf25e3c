use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use std::sync::{Mutex, PoisonError};

/// Source of the current time
///
/// Everything time-dependent (unblock expiry, usage windows, day rollover) reads
/// the time through this so tests can move it by hand.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Calendar date of `now` in the local timezone
pub fn local_date(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&Local).date_naive()
}

/// Local midnight at the start of the day containing `now`
pub fn start_of_local_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let local = now.with_timezone(&Local);
    let midnight = local.date_naive().and_time(NaiveTime::MIN);

    match Local.from_local_datetime(&midnight).earliest() {
        Some(start) => start.with_timezone(&Utc),
        // Midnight skipped by a DST jump; fall back to the current offset
        None => {
            let offset = Duration::seconds(i64::from(local.offset().local_minus_utc()));
            Utc.from_utc_datetime(&midnight) - offset
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2025, 11, 16, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);

        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), start + Duration::minutes(5));

        clock.advance(Duration::hours(1));
        assert_eq!(clock.now(), start + Duration::minutes(65));
    }

    #[test]
    fn test_start_of_local_day_is_within_a_day() {
        let now = Utc::now();
        let start = start_of_local_day(now);

        assert!(start <= now);
        assert!(now - start < Duration::hours(25));
        assert_eq!(local_date(start), local_date(now));
    }

    #[test]
    fn test_start_of_local_day_is_local_midnight() {
        let now = Utc.with_ymd_and_hms(2025, 6, 3, 15, 30, 0).unwrap();
        let start = start_of_local_day(now).with_timezone(&Local);

        assert_eq!(start.time(), NaiveTime::MIN);
    }
}
