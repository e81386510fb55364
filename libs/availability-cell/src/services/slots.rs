use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::models::{AvailabilityWindow, BusyInterval, Slot};

/// Derives the bookable slots of one provider on one date.
///
/// Each applicable window is walked on a fixed grid of `slot_duration`
/// increments from its start. An increment is emitted unless it intersects a
/// break or a busy interval, or would cross the window end. Output is
/// strictly ascending and non-overlapping, and depends on nothing but the
/// inputs.
pub struct SlotGenerator<'a> {
    provider_id: Uuid,
    date: NaiveDate,
    windows: Vec<&'a AvailabilityWindow>,
    busy: &'a [BusyInterval],
}

impl<'a> SlotGenerator<'a> {
    pub fn new(provider_id: Uuid, date: NaiveDate, windows: &'a [AvailabilityWindow], busy: &'a [BusyInterval]) -> Self {
        let mut applicable: Vec<&AvailabilityWindow> = windows
            .iter()
            .filter(|window| window.provider_id == provider_id && window.applies_to.applies_on(date))
            .filter(|window| window.slot_duration_minutes > 0)
            .collect();
        applicable.sort_by_key(|window| (window.start_time, window.id));

        Self {
            provider_id,
            date,
            windows: applicable,
            busy,
        }
    }

    /// A fresh pass over the slots. Each call starts from the beginning.
    pub fn slots(&self) -> Slots<'_> {
        Slots {
            provider_id: self.provider_id,
            date: self.date,
            windows: &self.windows,
            busy: self.busy,
            window_index: 0,
            cursor: None,
            last_end: None,
        }
    }
}

/// Iterator over the slots of a [`SlotGenerator`], in ascending start order.
pub struct Slots<'s> {
    provider_id: Uuid,
    date: NaiveDate,
    windows: &'s [&'s AvailabilityWindow],
    busy: &'s [BusyInterval],
    window_index: usize,
    cursor: Option<DateTime<Utc>>,
    last_end: Option<DateTime<Utc>>,
}

impl Slots<'_> {
    fn on_date(&self, time: NaiveTime) -> DateTime<Utc> {
        self.date.and_time(time).and_utc()
    }
}

impl Iterator for Slots<'_> {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        loop {
            let window = *self.windows.get(self.window_index)?;
            let window_end = self.on_date(window.end_time);
            let start = self.cursor.unwrap_or_else(|| self.on_date(window.start_time));
            let end = match start.checked_add_signed(window.slot_duration()) {
                Some(end) if end <= window_end => end,
                // Partial tail, or past the last representable instant.
                _ => {
                    self.window_index += 1;
                    self.cursor = None;
                    continue;
                }
            };
            self.cursor = Some(end);

            let in_break = window
                .breaks
                .iter()
                .any(|brk| self.on_date(brk.start_time) < end && start < self.on_date(brk.end_time));
            if in_break {
                continue;
            }

            if self.busy.iter().any(|busy| busy.intersects(start, end)) {
                continue;
            }

            // Overlapping windows would otherwise yield overlapping slots.
            if self.last_end.is_some_and(|last_end| start < last_end) {
                continue;
            }

            self.last_end = Some(end);
            return Some(Slot {
                provider_id: self.provider_id,
                start_time: start,
                end_time: end,
                duration_minutes: window.slot_duration_minutes,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BreakInterval, WindowSchedule};
    use chrono::Weekday;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    fn window(provider_id: Uuid, start: NaiveTime, end: NaiveTime, minutes: u32, breaks: &[(NaiveTime, NaiveTime)]) -> AvailabilityWindow {
        AvailabilityWindow {
            id: Uuid::new_v4(),
            provider_id,
            applies_to: WindowSchedule::Weekly { weekday: Weekday::Mon },
            start_time: start,
            end_time: end,
            slot_duration_minutes: minutes,
            breaks: breaks
                .iter()
                .map(|&(start_time, end_time)| BreakInterval { start_time, end_time })
                .collect(),
            revision: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn starts(generator: &SlotGenerator<'_>) -> Vec<NaiveTime> {
        generator.slots().map(|slot| slot.start_time.time()).collect()
    }

    #[test]
    fn skips_increments_hitting_a_break() {
        let provider = Uuid::new_v4();
        let windows = [window(provider, hm(9, 0), hm(12, 0), 30, &[(hm(10, 0), hm(10, 15))])];
        let generator = SlotGenerator::new(provider, monday(), &windows, &[]);

        assert_eq!(
            starts(&generator),
            vec![hm(9, 0), hm(9, 30), hm(10, 30), hm(11, 0), hm(11, 30)]
        );
    }

    #[test]
    fn skips_busy_intervals_and_partial_tail() {
        let provider = Uuid::new_v4();
        let windows = [window(provider, hm(9, 0), hm(10, 50), 30, &[])];
        let busy = [BusyInterval::new(
            monday().and_time(hm(9, 15)).and_utc(),
            monday().and_time(hm(9, 45)).and_utc(),
        )];
        let generator = SlotGenerator::new(provider, monday(), &windows, &busy);

        // 09:00 and 09:30 both touch the busy interval; 10:30-11:00 would cross the end.
        assert_eq!(starts(&generator), vec![hm(10, 0)]);
    }

    #[test]
    fn ignores_other_dates_and_providers() {
        let provider = Uuid::new_v4();
        let windows = [
            window(Uuid::new_v4(), hm(9, 0), hm(10, 0), 30, &[]),
            window(provider, hm(9, 0), hm(10, 0), 30, &[]),
        ];
        let tuesday = monday().succ_opt().unwrap();

        assert_eq!(SlotGenerator::new(provider, monday(), &windows, &[]).slots().count(), 2);
        assert_eq!(SlotGenerator::new(provider, tuesday, &windows, &[]).slots().count(), 0);
    }

    #[test]
    fn overlapping_windows_never_yield_overlapping_slots() {
        let provider = Uuid::new_v4();
        let windows = [
            window(provider, hm(9, 0), hm(11, 0), 60, &[]),
            window(provider, hm(9, 30), hm(12, 0), 30, &[]),
        ];
        let generator = SlotGenerator::new(provider, monday(), &windows, &[]);
        let slots: Vec<Slot> = generator.slots().collect();

        assert!(slots.windows(2).all(|pair| pair[0].end_time <= pair[1].start_time));
        assert_eq!(
            slots.iter().map(|slot| slot.start_time.time()).collect::<Vec<_>>(),
            vec![hm(9, 0), hm(10, 0), hm(11, 0), hm(11, 30)]
        );
    }

    #[test]
    fn last_calendar_day_stops_instead_of_overflowing() {
        let provider = Uuid::new_v4();
        let windows = [AvailabilityWindow {
            applies_to: WindowSchedule::Date { date: NaiveDate::MAX },
            ..window(provider, hm(23, 0), NaiveTime::from_hms_opt(23, 59, 59).unwrap(), 30, &[])
        }];
        let generator = SlotGenerator::new(provider, NaiveDate::MAX, &windows, &[]);

        assert_eq!(starts(&generator), vec![hm(23, 0)]);
    }

    #[test]
    fn iteration_is_restartable() {
        let provider = Uuid::new_v4();
        let windows = [window(provider, hm(9, 0), hm(12, 0), 45, &[])];
        let generator = SlotGenerator::new(provider, monday(), &windows, &[]);

        let first: Vec<Slot> = generator.slots().collect();
        let second: Vec<Slot> = generator.slots().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }
}
