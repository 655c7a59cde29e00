//! Wall-clock source, pinned to Taiwan local time.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Asia::Taipei;

/// Source of "now" for the aggregator and classifier.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Real time in Asia/Taipei.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&Taipei).fixed_offset()
    }
}

/// A clock that never moves. Useful in tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

/// Interpret a naive local date and time as Asia/Taipei.
pub fn taipei_datetime(date: NaiveDate, time: NaiveTime) -> Option<DateTime<FixedOffset>> {
    taipei_from_naive(date.and_time(time))
}

pub fn taipei_from_naive(naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
    Taipei
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taipei_offset_is_plus_eight() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let time = NaiveTime::from_hms_opt(6, 0, 0).unwrap();
        let dt = taipei_datetime(date, time).unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 8 * 3600);
        assert_eq!(dt.to_rfc3339(), "2024-03-01T06:00:00+08:00");
    }

    #[test]
    fn test_fixed_clock_today() {
        let now = DateTime::parse_from_rfc3339("2024-03-01T23:30:00+08:00").unwrap();
        let clock = FixedClock(now);
        assert_eq!(clock.now(), now);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn test_system_clock_reports_taipei_offset() {
        assert_eq!(SystemClock.now().offset().local_minus_utc(), 8 * 3600);
    }
}
