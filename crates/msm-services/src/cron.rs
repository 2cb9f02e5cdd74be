//! 5-field cron grammar (§4.7, §6) — minute, hour, day-of-month, month,
//! day-of-week. Ranges, lists, `*`, and `*/N` stepping are all required by
//! the grammar; day-of-month and day-of-week combine with OR when both are
//! restricted, matching the standard convention.
//!
//! No cron-parsing crate appears anywhere in the teacher or wider retrieval
//! pack, so this is hand-rolled rather than borrowed.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CronError {
    #[error("cron expression must have exactly 5 fields, got {0}")]
    WrongFieldCount(usize),
    #[error("invalid {field} field {value:?}: {reason}")]
    InvalidField { field: &'static str, value: String, reason: String },
    #[error("no fire time found within the search horizon")]
    Unsatisfiable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    minute: BTreeSet<u32>,
    hour: BTreeSet<u32>,
    dom: BTreeSet<u32>,
    month: BTreeSet<u32>,
    dow: BTreeSet<u32>,
    dom_restricted: bool,
    dow_restricted: bool,
}

/// How far ahead to search for a fire time before giving up. Four years
/// covers every realistic leap-year/Feb-29 edge case.
const SEARCH_HORIZON_MINUTES: i64 = 4 * 366 * 24 * 60;

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self, CronError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronError::WrongFieldCount(fields.len()));
        }

        let minute = parse_field("minute", fields[0], 0, 59)?;
        let hour = parse_field("hour", fields[1], 0, 23)?;
        let dom = parse_field("day-of-month", fields[2], 1, 31)?;
        let month = parse_field("month", fields[3], 1, 12)?;
        let dow = parse_field("day-of-week", fields[4], 0, 7)?;
        // 7 is a common alias for Sunday alongside 0; normalize it away.
        let dow: BTreeSet<u32> = dow.into_iter().map(|d| if d == 7 { 0 } else { d }).collect();

        Ok(Self {
            dom_restricted: fields[2] != "*",
            dow_restricted: fields[4] != "*",
            minute,
            hour,
            dom,
            month,
            dow,
        })
    }

    fn matches_day(&self, date: &DateTime<Utc>) -> bool {
        let dom_ok = self.dom.contains(&date.day());
        let dow_ok = self.dow.contains(&date.weekday().num_days_from_sunday());
        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom_ok || dow_ok,
            (true, false) => dom_ok,
            (false, true) => dow_ok,
            (false, false) => true,
        }
    }

    fn matches(&self, date: &DateTime<Utc>) -> bool {
        self.minute.contains(&date.minute())
            && self.hour.contains(&date.hour())
            && self.month.contains(&date.month())
            && self.matches_day(date)
    }

    /// First fire time strictly after `from`, truncated to whole minutes
    /// (cron has no sub-minute resolution).
    pub fn first_fire_after(&self, from: DateTime<Utc>) -> Result<DateTime<Utc>, CronError> {
        let start = Utc
            .with_ymd_and_hms(from.year(), from.month(), from.day(), from.hour(), from.minute(), 0)
            .single()
            .unwrap_or(from)
            + Duration::minutes(1);

        let mut candidate = start;
        for _ in 0..SEARCH_HORIZON_MINUTES {
            if self.matches(&candidate) {
                return Ok(candidate);
            }
            candidate += Duration::minutes(1);
        }
        Err(CronError::Unsatisfiable)
    }
}

fn parse_field(name: &'static str, raw: &str, min: u32, max: u32) -> Result<BTreeSet<u32>, CronError> {
    let mut values = BTreeSet::new();
    for part in raw.split(',') {
        parse_part(name, part, min, max, &mut values)?;
    }
    Ok(values)
}

fn parse_part(
    name: &'static str,
    part: &str,
    min: u32,
    max: u32,
    out: &mut BTreeSet<u32>,
) -> Result<(), CronError> {
    let invalid = |reason: &str| CronError::InvalidField {
        field: name,
        value: part.to_string(),
        reason: reason.to_string(),
    };

    let (range_part, step) = match part.split_once('/') {
        Some((r, s)) => {
            let step: u32 = s.parse().map_err(|_| invalid("step must be a non-negative integer"))?;
            if step == 0 {
                return Err(invalid("step must be greater than zero"));
            }
            (r, step)
        }
        None => (part, 1),
    };

    let (lo, hi) = if range_part == "*" {
        (min, max)
    } else if let Some((a, b)) = range_part.split_once('-') {
        let a: u32 = a.parse().map_err(|_| invalid("range start must be an integer"))?;
        let b: u32 = b.parse().map_err(|_| invalid("range end must be an integer"))?;
        if a > b {
            return Err(invalid("range start must not exceed range end"));
        }
        (a, b)
    } else {
        let v: u32 = range_part.parse().map_err(|_| invalid("expected a number, range, or '*'"))?;
        (v, v)
    };

    if lo < min || hi > max {
        return Err(invalid(&format!("value out of range {min}-{max}")));
    }

    let mut v = lo;
    while v <= hi {
        out.insert(v);
        v += step;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_minute_matches_the_immediate_next_minute() {
        let cron = CronSchedule::parse("* * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let next = cron.first_fire_after(now).unwrap();
        assert_eq!(next, now + Duration::minutes(1));
    }

    #[test]
    fn step_expression_lands_on_the_right_minutes() {
        let cron = CronSchedule::parse("*/15 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 5, 0).unwrap();
        let next = cron.first_fire_after(now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 12, 15, 0).unwrap());
    }

    #[test]
    fn daily_at_3am_skips_to_the_next_day_when_past_the_hour() {
        let cron = CronSchedule::parse("0 3 * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 4, 0, 0).unwrap();
        let next = cron.first_fire_after(now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 2, 3, 0, 0).unwrap());
    }

    #[test]
    fn dom_and_dow_combine_with_or_when_both_restricted() {
        // Fires on the 15th of the month OR on Mondays (dow=1), at minute 0 hour 0.
        let cron = CronSchedule::parse("0 0 15 * 1").unwrap();
        // 2026-01-05 is a Monday, not the 15th — should still match via dow.
        let monday = Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap();
        assert!(cron.matches(&monday));
        // 2026-01-15 is a Thursday, not a Monday — should still match via dom.
        let the_15th = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        assert!(cron.matches(&the_15th));
    }

    #[test]
    fn list_field_matches_only_the_listed_values() {
        let cron = CronSchedule::parse("0,30 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let next = cron.first_fire_after(now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 12, 30, 0).unwrap());
    }

    #[test]
    fn wrong_field_count_is_rejected() {
        assert_eq!(CronSchedule::parse("* * * *"), Err(CronError::WrongFieldCount(4)));
    }

    #[test]
    fn out_of_range_value_is_rejected() {
        assert!(CronSchedule::parse("60 * * * *").is_err());
    }
}
