//! Budget period windows and recurrence calendar arithmetic
//!
//! Windows are closed ranges `[from, to]` with millisecond precision: a day
//! runs from `00:00:00.000` to `23:59:59.999` local time. Everything here is
//! pure so it can be called on every aggregation.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::models::{Period, Recurrence};

/// A closed date-time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

impl DateRange {
    pub fn new(from: NaiveDateTime, to: NaiveDateTime) -> Self {
        Self { from, to }
    }

    /// Whole calendar days `first..=last`
    pub fn days(first: NaiveDate, last: NaiveDate) -> Self {
        Self {
            from: start_of_day(first),
            to: end_of_day(last),
        }
    }

    /// True when clamping pushed the start past the end
    pub fn is_empty(&self) -> bool {
        self.from > self.to
    }
}

pub fn start_of_day(day: NaiveDate) -> NaiveDateTime {
    day.and_time(NaiveTime::MIN)
}

pub fn end_of_day(day: NaiveDate) -> NaiveDateTime {
    let last_ms = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).expect("23:59:59.999 always valid");
    day.and_time(last_ms)
}

fn last_day_of_month(first: NaiveDate) -> NaiveDate {
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

/// Compute the window of `period` that contains `reference`
///
/// Weeks are ISO weeks (Monday through Sunday); months and years cover their
/// first through last calendar day.
pub fn compute_range(period: Period, reference: NaiveDateTime) -> DateRange {
    let day = reference.date();

    match period {
        Period::Daily => DateRange::days(day, day),
        Period::Weekly => {
            // Sunday is 6 days after Monday, so the week never starts on it
            let offset = day.weekday().num_days_from_monday() as i64;
            let monday = day - Duration::days(offset);
            DateRange::days(monday, monday + Duration::days(6))
        }
        Period::Monthly => {
            let first = day.with_day(1).expect("Day 1 always valid");
            DateRange::days(first, last_day_of_month(first))
        }
        Period::Yearly => {
            let first = NaiveDate::from_ymd_opt(day.year(), 1, 1).expect("Jan 1 always valid");
            let last = NaiveDate::from_ymd_opt(day.year(), 12, 31).expect("Dec 31 always valid");
            DateRange::days(first, last)
        }
    }
}

/// Restrict a window so it never starts before `budget_start`
pub fn clamp_to_start(range: DateRange, budget_start: NaiveDateTime) -> DateRange {
    DateRange {
        from: range.from.max(budget_start),
        to: range.to,
    }
}

/// The window immediately before `range`
pub fn previous_range(period: Period, range: DateRange) -> DateRange {
    compute_range(period, range.from - Duration::milliseconds(1))
}

/// The `k`-th member of a series starting at `start` (`k = 0` is `start`)
///
/// Month and year steps are taken from `start` so short months clamp to
/// their last day without shifting later occurrences.
pub fn occurrence_at(
    start: NaiveDateTime,
    recurrence: Recurrence,
    k: u32,
) -> Option<NaiveDateTime> {
    match recurrence {
        Recurrence::Daily => start.checked_add_signed(Duration::days(k as i64)),
        Recurrence::Weekly => start.checked_add_signed(Duration::weeks(k as i64)),
        Recurrence::Monthly => start.checked_add_months(Months::new(k)),
        Recurrence::Yearly => start.checked_add_months(Months::new(k.checked_mul(12)?)),
    }
}

/// First member of the series strictly after `after`, with its index
///
/// Only indices `k >= 1` are considered; the template itself is never "next".
pub fn next_occurrence_after(
    start: NaiveDateTime,
    recurrence: Recurrence,
    after: NaiveDateTime,
) -> Option<(u32, NaiveDateTime)> {
    let estimate = if after <= start {
        1
    } else {
        let (s, a) = (start.date(), after.date());
        let months = (a.year() - s.year()) as i64 * 12 + a.month() as i64 - s.month() as i64;
        let steps = match recurrence {
            Recurrence::Daily => (a - s).num_days(),
            Recurrence::Weekly => (a - s).num_days() / 7,
            Recurrence::Monthly => months,
            Recurrence::Yearly => months / 12,
        };
        u32::try_from(steps.saturating_sub(1).max(1)).ok()?
    };

    let mut k = estimate;
    loop {
        let candidate = occurrence_at(start, recurrence, k)?;
        if candidate > after {
            return Some((k, candidate));
        }
        k = k.checked_add(1)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_daily_range_spans_whole_day() {
        let range = compute_range(Period::Daily, at(2024, 1, 20, 15));
        assert_eq!(range.from, start_of_day(date(2024, 1, 20)));
        assert_eq!(range.to, end_of_day(date(2024, 1, 20)));
        assert_eq!(range.to.format("%H:%M:%S%.3f").to_string(), "23:59:59.999");
    }

    #[test]
    fn test_weekly_range_sunday_belongs_to_previous_monday() {
        // 2024-01-21 is a Sunday
        let range = compute_range(Period::Weekly, at(2024, 1, 21, 10));
        assert_eq!(range.from.date(), date(2024, 1, 15));
        assert_eq!(range.to.date(), date(2024, 1, 21));
    }

    #[test]
    fn test_monthly_range_handles_leap_february() {
        let range = compute_range(Period::Monthly, at(2024, 2, 10, 0));
        assert_eq!(range.from.date(), date(2024, 2, 1));
        assert_eq!(range.to.date(), date(2024, 2, 29));

        let december = compute_range(Period::Monthly, at(2023, 12, 31, 23));
        assert_eq!(december.from.date(), date(2023, 12, 1));
        assert_eq!(december.to.date(), date(2023, 12, 31));
    }

    #[test]
    fn test_yearly_range() {
        let range = compute_range(Period::Yearly, at(2024, 7, 4, 12));
        assert_eq!(range.from, start_of_day(date(2024, 1, 1)));
        assert_eq!(range.to, end_of_day(date(2024, 12, 31)));
    }

    #[test]
    fn test_every_range_contains_its_reference() {
        let periods = [Period::Daily, Period::Weekly, Period::Monthly, Period::Yearly];
        let mut day = date(2023, 1, 1);
        while day <= date(2025, 1, 31) {
            for hour in [0, 13, 23] {
                let reference = day.and_hms_opt(hour, 59, 59).unwrap();
                for period in periods {
                    let range = compute_range(period, reference);
                    assert!(
                        range.from <= reference && reference <= range.to,
                        "{:?} window {:?} misses {}",
                        period,
                        range,
                        reference
                    );
                }
            }
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_weekly_ranges_always_monday_to_sunday() {
        let mut day = date(2024, 1, 1);
        for _ in 0..60 {
            let range = compute_range(Period::Weekly, start_of_day(day));
            assert_eq!(range.from.weekday(), Weekday::Mon);
            assert_eq!(range.to.weekday(), Weekday::Sun);
            assert_eq!((range.to.date() - range.from.date()).num_days(), 6);
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_clamp_to_start() {
        let range = compute_range(Period::Monthly, at(2024, 1, 20, 0));
        let clamped = clamp_to_start(range, start_of_day(date(2024, 1, 15)));
        assert_eq!(clamped.from.date(), date(2024, 1, 15));
        assert_eq!(clamped.to, range.to);

        // Budget started before the window: untouched
        let early = clamp_to_start(range, start_of_day(date(2023, 6, 1)));
        assert_eq!(early, range);
    }

    #[test]
    fn test_clamp_never_inverts_when_start_inside_window() {
        let range = compute_range(Period::Weekly, at(2024, 3, 6, 0));
        let mut start = range.from;
        while start <= range.to {
            assert!(!clamp_to_start(range, start).is_empty());
            start += Duration::hours(7);
        }
        assert!(clamp_to_start(range, range.to + Duration::days(1)).is_empty());
    }

    #[test]
    fn test_previous_range() {
        let march = compute_range(Period::Monthly, at(2024, 3, 15, 0));
        let feb = previous_range(Period::Monthly, march);
        assert_eq!(feb.from.date(), date(2024, 2, 1));
        assert_eq!(feb.to.date(), date(2024, 2, 29));
        let first_week = compute_range(Period::Weekly, at(2024, 1, 3, 0));
        let jan_week = previous_range(Period::Weekly, first_week);
        assert_eq!(jan_week.from.date(), date(2023, 12, 25));
    }

    #[test]
    fn test_monthly_occurrences_do_not_drift() {
        let start = at(2024, 1, 31, 9);
        assert_eq!(occurrence_at(start, Recurrence::Monthly, 1), Some(at(2024, 2, 29, 9)));
        assert_eq!(occurrence_at(start, Recurrence::Monthly, 2), Some(at(2024, 3, 31, 9)));
        assert_eq!(occurrence_at(start, Recurrence::Yearly, 1), Some(at(2025, 1, 31, 9)));
        assert_eq!(occurrence_at(start, Recurrence::Weekly, 2), Some(at(2024, 2, 14, 9)));
    }

    #[test]
    fn test_next_occurrence_after() {
        let start = at(2024, 1, 1, 0);
        assert_eq!(
            next_occurrence_after(start, Recurrence::Monthly, start),
            Some((1, at(2024, 2, 1, 0)))
        );
        assert_eq!(
            next_occurrence_after(start, Recurrence::Monthly, at(2024, 3, 1, 0)),
            Some((3, at(2024, 4, 1, 0)))
        );
        assert_eq!(
            next_occurrence_after(start, Recurrence::Daily, at(2024, 1, 10, 12)),
            Some((10, at(2024, 1, 11, 0)))
        );
        assert_eq!(
            next_occurrence_after(start, Recurrence::Weekly, at(2024, 1, 8, 0)),
            Some((2, at(2024, 1, 15, 0)))
        );
        assert_eq!(
            next_occurrence_after(start, Recurrence::Yearly, at(2026, 6, 1, 0)),
            Some((3, at(2027, 1, 1, 0)))
        );
    }
}
