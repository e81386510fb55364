use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive calendar-date range, `from..=to`, interpreted in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, String> {
        if from > to {
            return Err(format!("Range start {} is after range end {}", from, to));
        }
        if to.succ_opt().is_none() {
            return Err(format!("Range end {} is outside the supported calendar", to));
        }
        Ok(Self { from, to })
    }

    pub fn single(date: NaiveDate) -> Self {
        Self { from: date, to: date }
    }

    /// Like `new`, but also rejects ranges longer than `max_days`.
    pub fn bounded(from: NaiveDate, to: NaiveDate, max_days: i64) -> Result<Self, String> {
        let range = Self::new(from, to)?;
        if range.len_days() > max_days {
            return Err(format!(
                "Range of {} days exceeds the maximum of {} days",
                range.len_days(),
                max_days
            ));
        }
        Ok(range)
    }

    pub fn len_days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.from.iter_days().take_while(move |day| *day <= self.to)
    }

    /// First instant of the range.
    pub fn start_utc(&self) -> DateTime<Utc> {
        self.from.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// Exclusive upper bound: midnight after `to`, saturating at the last
    /// representable instant.
    pub fn end_utc(&self) -> DateTime<Utc> {
        self.to
            .succ_opt()
            .map_or(DateTime::<Utc>::MAX_UTC, |next| next.and_time(chrono::NaiveTime::MIN).and_utc())
    }

    /// Calendar dates touched by the half-open interval `[start, end)`.
    pub fn covering(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let from = start.date_naive();
        let last_instant = if end > start { end - Duration::nanoseconds(1) } else { start };
        Self { from, to: last_instant.date_naive().max(from) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(DateRange::new(date(2025, 3, 2), date(2025, 3, 1)).is_err());
    }

    #[test]
    fn bounded_enforces_span() {
        assert!(DateRange::bounded(date(2025, 1, 1), date(2025, 1, 31), 31).is_ok());
        assert!(DateRange::bounded(date(2025, 1, 1), date(2025, 2, 1), 31).is_err());
    }

    #[test]
    fn covering_excludes_midnight_end() {
        let start = date(2025, 3, 3).and_hms_opt(23, 30, 0).unwrap().and_utc();
        let end = date(2025, 3, 4).and_hms_opt(0, 0, 0).unwrap().and_utc();
        assert_eq!(DateRange::covering(start, end), DateRange::single(date(2025, 3, 3)));

        let later = date(2025, 3, 4).and_hms_opt(0, 30, 0).unwrap().and_utc();
        assert_eq!(
            DateRange::covering(start, later),
            DateRange::new(date(2025, 3, 3), date(2025, 3, 4)).unwrap()
        );
    }

    #[test]
    fn rejects_end_of_calendar() {
        assert!(DateRange::new(NaiveDate::MAX, NaiveDate::MAX).is_err());
        assert!(DateRange::bounded(NaiveDate::MAX, NaiveDate::MAX, 92).is_err());
        assert!(DateRange::single(NaiveDate::MAX).end_utc() > DateRange::single(NaiveDate::MAX).start_utc());
    }

    #[test]
    fn utc_bounds_are_half_open() {
        let range = DateRange::single(date(2025, 3, 3));
        assert_eq!(range.end_utc() - range.start_utc(), Duration::days(1));
        assert_eq!(range.days().count(), 1);
    }
}
