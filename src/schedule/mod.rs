//! # Cron schedules.
//!
//! [`Schedule`] is a parsed five-field cron expression:
//!
//! ```text
//! ┌──────── minute        0-59
//! │ ┌────── hour          0-23
//! │ │ ┌──── day of month  1-31
//! │ │ │ ┌── month         1-12 or jan-dec
//! │ │ │ │ ┌ day of week   0-7 or sun-sat (0 and 7 are Sunday)
//! * * * * *
//! ```
//!
//! Each field accepts `*`, `?`, single values, ranges `a-b`, steps `*/n`, `a-b/n`, `a/n` and
//! comma-separated lists. The macros `@yearly`, `@annually`, `@monthly`, `@weekly`, `@daily`,
//! `@midnight` and `@hourly` are accepted as well.
//!
//! When both day fields are restricted a day matches if *either* matches; when one of them
//! starts with `*` only the other one applies.
//!
//! ## Example
//! ```rust
//! use chrono::{Local, TimeZone, Timelike};
//! use routine::Schedule;
//!
//! let every_quarter: Schedule = "*/15 * * * *".parse().unwrap();
//! let now = Local.with_ymd_and_hms(2024, 5, 1, 10, 7, 30).unwrap();
//! let next = every_quarter.next_after(&now).unwrap();
//! assert_eq!((next.hour(), next.minute(), next.second()), (10, 15, 0));
//! ```

mod field;

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Datelike, LocalResult, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Timelike,
};

use crate::error::Error;

/// Upper bound of the forward search; expressions with no match within it never fire.
const SEARCH_YEARS: i32 = 8;

/// Parsed cron expression.
#[derive(Clone, PartialEq, Eq)]
pub struct Schedule {
    expr: String,
    minutes: u64,
    hours: u64,
    days: u64,
    months: u64,
    weekdays: u64,
    any_day: bool,
    any_weekday: bool,
}

impl Schedule {
    /// Parses `expr`.
    pub fn parse(expr: &str) -> Result<Self, Error> {
        let invalid = |reason: String| Error::InvalidSchedule {
            expr: expr.to_string(),
            reason,
        };

        let trimmed = expr.trim();
        let expanded = match trimmed {
            "@yearly" | "@annually" => "0 0 1 1 *",
            "@monthly" => "0 0 1 * *",
            "@weekly" => "0 0 * * 0",
            "@daily" | "@midnight" => "0 0 * * *",
            "@hourly" => "0 * * * *",
            other if other.starts_with('@') => {
                return Err(invalid(format!("unknown macro {other:?}")));
            }
            other => other,
        };

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        let &[minute, hour, day, month, weekday] = fields.as_slice() else {
            return Err(invalid(format!("expected 5 fields, found {}", fields.len())));
        };

        let mut weekdays = field::parse(weekday, &field::WEEKDAY).map_err(invalid)?;
        if weekdays & (1 << 7) != 0 {
            weekdays = (weekdays | 1) & !(1 << 7);
        }

        Ok(Self {
            expr: trimmed.to_string(),
            minutes: field::parse(minute, &field::MINUTE).map_err(invalid)?,
            hours: field::parse(hour, &field::HOUR).map_err(invalid)?,
            days: field::parse(day, &field::DAY).map_err(invalid)?,
            months: field::parse(month, &field::MONTH).map_err(invalid)?,
            weekdays,
            any_day: day.starts_with('*') || day == "?",
            any_weekday: weekday.starts_with('*') || weekday == "?",
        })
    }

    /// The expression this schedule was parsed from.
    pub fn as_str(&self) -> &str {
        &self.expr
    }

    /// Returns the first matching minute strictly after `after`, in `after`'s time zone.
    ///
    /// Local times skipped by a DST transition never match; ambiguous local times resolve to
    /// their earlier instant. Returns `None` if nothing matches within the search window.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = after.timezone();
        let start = after.naive_local().with_second(0)?.with_nanosecond(0)?;
        let mut t = start + TimeDelta::minutes(1);
        let limit = t.year() + SEARCH_YEARS;

        while t.year() <= limit {
            if !bit(self.months, t.month()) {
                t = next_month(t)?;
                continue;
            }
            if !self.day_matches(t.date()) {
                t = t.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !bit(self.hours, t.hour()) {
                t = t.date().and_hms_opt(t.hour(), 0, 0)? + TimeDelta::hours(1);
                continue;
            }
            if !bit(self.minutes, t.minute()) {
                t += TimeDelta::minutes(1);
                continue;
            }
            let at = match tz.from_local_datetime(&t) {
                LocalResult::Single(at) => Some(at),
                LocalResult::Ambiguous(earliest, _) => Some(earliest),
                LocalResult::None => None,
            };
            match at {
                Some(at) if at > *after => return Some(at),
                _ => t += TimeDelta::minutes(1),
            }
        }
        None
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = bit(self.days, date.day());
        let dow = bit(self.weekdays, date.weekday().num_days_from_sunday());
        match (self.any_day, self.any_weekday) {
            (true, true) => true,
            (true, false) => dow,
            (false, true) => dom,
            (false, false) => dom || dow,
        }
    }
}

fn bit(set: u64, v: u32) -> bool {
    set & (1 << v) != 0
}

fn next_month(t: NaiveDateTime) -> Option<NaiveDateTime> {
    let (y, m) = if t.month() == 12 {
        (t.year() + 1, 1)
    } else {
        (t.year(), t.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)?.and_hms_opt(0, 0, 0)
}

impl FromStr for Schedule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Schedule::parse(s)
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Schedule").field(&self.expr).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn next(expr: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        Schedule::parse(expr).unwrap().next_after(&after)
    }

    #[test]
    fn every_minute_is_the_next_whole_minute() {
        assert_eq!(
            next("* * * * *", utc(2024, 1, 1, 12, 30, 15)),
            Some(utc(2024, 1, 1, 12, 31, 0))
        );
        // strictly after, even on a boundary
        assert_eq!(
            next("* * * * *", utc(2024, 1, 1, 12, 30, 0)),
            Some(utc(2024, 1, 1, 12, 31, 0))
        );
    }

    #[test]
    fn rolls_over_hours_days_and_years() {
        assert_eq!(
            next("0 0 * * *", utc(2024, 12, 31, 23, 59, 59)),
            Some(utc(2025, 1, 1, 0, 0, 0))
        );
        assert_eq!(
            next("30 9 1 jun *", utc(2024, 6, 1, 9, 30, 0)),
            Some(utc(2025, 6, 1, 9, 30, 0))
        );
    }

    #[test]
    fn weekday_names_and_sunday_as_seven() {
        // 2024-05-01 is a Wednesday
        assert_eq!(
            next("0 8 * * mon-fri", utc(2024, 5, 3, 9, 0, 0)),
            Some(utc(2024, 5, 6, 8, 0, 0))
        );
        assert_eq!(
            next("0 8 * * 7", utc(2024, 5, 1, 0, 0, 0)),
            Some(utc(2024, 5, 5, 8, 0, 0))
        );
    }

    #[test]
    fn restricted_day_fields_are_ored() {
        // the 15th (Wed) or any Monday, whichever comes first
        assert_eq!(
            next("0 0 15 * 1", utc(2024, 5, 1, 0, 0, 0)),
            Some(utc(2024, 5, 6, 0, 0, 0))
        );
        assert_eq!(
            next("0 0 15 * 1", utc(2024, 5, 13, 0, 0, 0)),
            Some(utc(2024, 5, 15, 0, 0, 0))
        );
    }

    #[test]
    fn leap_day_is_found_and_impossible_dates_are_not() {
        assert_eq!(
            next("0 0 29 2 *", utc(2025, 3, 1, 0, 0, 0)),
            Some(utc(2028, 2, 29, 0, 0, 0))
        );
        assert_eq!(next("0 0 31 4 *", utc(2025, 1, 1, 0, 0, 0)), None);
    }

    #[test]
    fn macros_expand() {
        assert_eq!(
            next("@hourly", utc(2024, 1, 1, 10, 0, 0)),
            Some(utc(2024, 1, 1, 11, 0, 0))
        );
        assert_eq!(
            next("@weekly", utc(2024, 5, 1, 0, 0, 0)),
            Some(utc(2024, 5, 5, 0, 0, 0))
        );
    }

    #[test]
    fn keeps_the_callers_offset() {
        let tz = FixedOffset::east_opt(3 * 3600).unwrap();
        let after = tz.with_ymd_and_hms(2024, 1, 1, 23, 10, 0).unwrap();
        let at = Schedule::parse("0 0 * * *").unwrap().next_after(&after).unwrap();
        assert_eq!(at, tz.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn rejects_bad_expressions() {
        for expr in ["", "* * * *", "* * * * * *", "61 * * * *", "@sometimes", "* * * foo *"] {
            let err = Schedule::parse(expr).unwrap_err();
            assert!(matches!(err, Error::InvalidSchedule { .. }), "{expr:?}");
        }
    }
}
