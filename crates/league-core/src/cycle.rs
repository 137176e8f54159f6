//! # Cycle Windows
//!
//! Weekly cycle boundaries. A cycle starts every Monday at 00:01 UTC and
//! lasts seven days. Cohorts are keyed by the Monday date of their cycle.
//!
//! Every function here is pure: the caller supplies the reference instant,
//! and any input time zone is normalised to UTC first.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::primitives::{CYCLE_LENGTH_DAYS, CYCLE_START_HOUR, CYCLE_START_MINUTE};

fn cycle_start_time() -> NaiveTime {
    NaiveTime::from_hms_opt(CYCLE_START_HOUR, CYCLE_START_MINUTE, 0).unwrap_or(NaiveTime::MIN)
}

fn cycle_length() -> Duration {
    Duration::days(CYCLE_LENGTH_DAYS)
}

/// The most recent cycle start at or before `reference`.
pub fn previous_cycle_start<Tz: TimeZone>(reference: &DateTime<Tz>) -> DateTime<Utc> {
    let reference = reference.with_timezone(&Utc);
    let days_since_monday = i64::from(reference.weekday().num_days_from_monday());
    let monday = reference.date_naive() - Duration::days(days_since_monday);
    let start = monday.and_time(cycle_start_time()).and_utc();

    if reference < start {
        start - cycle_length()
    } else {
        start
    }
}

/// The next cycle start strictly after `reference`.
pub fn next_cycle_start<Tz: TimeZone>(reference: &DateTime<Tz>) -> DateTime<Utc> {
    let reference = reference.with_timezone(&Utc);
    let mut next = previous_cycle_start(&reference) + cycle_length();
    while next <= reference {
        next += cycle_length();
    }
    next
}

/// Monday date of the cycle containing `reference`.
pub fn current_cycle_date<Tz: TimeZone>(reference: &DateTime<Tz>) -> NaiveDate {
    previous_cycle_start(reference).date_naive()
}

/// Monday date of the cycle before the one starting on `cycle_date`.
pub fn preceding_cycle_date(cycle_date: NaiveDate) -> NaiveDate {
    cycle_date - cycle_length()
}

/// Monday date of the cycle after the one starting on `cycle_date`.
pub fn following_cycle_date(cycle_date: NaiveDate) -> NaiveDate {
    cycle_date + cycle_length()
}

/// Whole seconds until the next cycle start, never negative.
pub fn countdown_seconds(now: DateTime<Utc>) -> i64 {
    (next_cycle_start(&now) - now).num_seconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn monday_after_start_is_its_own_cycle() {
        // 2024-01-01 is a Monday
        let t = utc(2024, 1, 1, 12, 0);
        assert_eq!(previous_cycle_start(&t), utc(2024, 1, 1, 0, 1));
        assert_eq!(next_cycle_start(&t), utc(2024, 1, 8, 0, 1));
    }

    #[test]
    fn monday_before_start_belongs_to_previous_week() {
        let t = utc(2024, 1, 1, 0, 0);
        assert_eq!(previous_cycle_start(&t), utc(2023, 12, 25, 0, 1));
        assert_eq!(next_cycle_start(&t), utc(2024, 1, 1, 0, 1));
    }

    #[test]
    fn exact_boundary_is_inclusive_on_the_left() {
        let t = utc(2024, 1, 1, 0, 1);
        assert_eq!(previous_cycle_start(&t), t);
        assert_eq!(next_cycle_start(&t), utc(2024, 1, 8, 0, 1));
    }

    #[test]
    fn sunday_night_rolls_into_monday() {
        let t = utc(2024, 1, 7, 23, 59);
        assert_eq!(current_cycle_date(&t), NaiveDate::from_ymd_opt(2024, 1, 1).expect("date"));
        assert_eq!(countdown_seconds(t), 120);
    }

    #[test]
    fn offsets_are_normalised_to_utc() {
        // Monday 01:00 at +02:00 is Sunday 23:00 UTC
        let tz = FixedOffset::east_opt(2 * 3600).expect("offset");
        let t = tz
            .with_ymd_and_hms(2024, 1, 8, 1, 0, 0)
            .single()
            .expect("valid timestamp");
        assert_eq!(previous_cycle_start(&t), utc(2024, 1, 1, 0, 1));
    }

    #[test]
    fn preceding_cycle_is_one_week_earlier() {
        let monday = NaiveDate::from_ymd_opt(2024, 1, 8).expect("date");
        assert_eq!(
            preceding_cycle_date(monday),
            NaiveDate::from_ymd_opt(2024, 1, 1).expect("date")
        );
    }
}
