//! Calendar arithmetic shared by the evaluators.
//!
//! Everything here works on `NaiveDate`: the engine reasons about calendar
//! days, never instants. Conversions from wall-clock time live in
//! [`crate::timezone`].

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Storage and display format for calendar dates (`yyyy-MM-dd`).
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses an ISO calendar date, returning `None` for anything malformed.
///
/// Callers that read persisted records rely on this to fail closed instead of
/// propagating an error into a listing.
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), ISO_DATE_FORMAT).ok()
}

pub fn format_iso_date(date: NaiveDate) -> String {
    date.format(ISO_DATE_FORMAT).to_string()
}

/// Parses an English weekday name ("Monday", "mon", "MON").
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    name.trim().parse::<Weekday>().ok()
}

/// Full English weekday name, the form stored on routine tasks.
pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Week-of-year used for weekly counter periods.
///
/// Weeks start on Sunday and are numbered within the calendar year:
/// `ceil((days_since_jan1 + jan1_weekday_from_sunday + 1) / 7)`.
/// Returns `(year, week)`.
pub fn week_of_year(date: NaiveDate) -> (i32, u32) {
    let year = date.year();
    let jan1_offset = NaiveDate::from_ymd_opt(year, 1, 1)
        .map(|jan1| jan1.weekday().num_days_from_sunday())
        .unwrap_or(0);
    let days_since_jan1 = date.ordinal0();
    let week = (days_since_jan1 + jan1_offset + 1).div_ceil(7);
    (year, week)
}

/// Monday of the week containing `date` (calendar views start weeks on Monday).
pub fn start_of_week(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

pub fn end_of_week(date: NaiveDate) -> NaiveDate {
    start_of_week(date) + Duration::days(6)
}

pub fn start_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn end_of_month(date: NaiveDate) -> NaiveDate {
    let last = days_in_month(date.year(), date.month());
    date.with_day(last).unwrap_or(date)
}

/// Number of days in the given month; 0 for an invalid month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return 0;
    };
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.map(|n| (n - first).num_days() as u32).unwrap_or(31)
}

/// Inclusive containment in `[start, end]`; an absent end is open-ended.
#[inline]
pub fn is_within(date: NaiveDate, start: NaiveDate, end: Option<NaiveDate>) -> bool {
    date >= start && end.map_or(true, |end| date <= end)
}

/// Signed whole days from `from` to `to`.
#[inline]
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Signed calendar-month distance from `from` to `to`, ignoring days.
#[inline]
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to.year() as i64 - from.year() as i64) * 12 + to.month() as i64 - from.month() as i64
}

/// Every day shown on a month page: whole Monday-to-Sunday weeks covering
/// the month containing `date`.
pub fn month_grid(date: NaiveDate) -> Vec<NaiveDate> {
    let start = start_of_week(start_of_month(date));
    let end = end_of_week(end_of_month(date));
    start.iter_days().take_while(|day| *day <= end).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_iso_date() {
        assert_eq!(parse_iso_date("2024-03-06"), Some(d(2024, 3, 6)));
        assert_eq!(parse_iso_date(" 2024-03-06 "), Some(d(2024, 3, 6)));
        assert_eq!(parse_iso_date("2024-02-30"), None);
        assert_eq!(parse_iso_date("06/03/2024"), None);
        assert_eq!(parse_iso_date(""), None);
    }

    #[test]
    fn test_weekday_names() {
        assert_eq!(parse_weekday("Monday"), Some(Weekday::Mon));
        assert_eq!(parse_weekday("sun"), Some(Weekday::Sun));
        assert_eq!(parse_weekday("Funday"), None);
        assert_eq!(weekday_name(Weekday::Wed), "Wednesday");
    }

    #[rstest]
    // 2024-01-01 is a Monday: offset 1
    #[case(d(2024, 1, 1), (2024, 1))]
    #[case(d(2024, 1, 6), (2024, 1))]
    #[case(d(2024, 1, 7), (2024, 2))]
    #[case(d(2024, 3, 10), (2024, 11))]
    #[case(d(2024, 3, 9), (2024, 10))]
    // 2023-01-01 is a Sunday: offset 0
    #[case(d(2023, 1, 1), (2023, 1))]
    #[case(d(2023, 1, 8), (2023, 2))]
    #[case(d(2024, 12, 31), (2024, 53))]
    fn test_week_of_year(#[case] date: NaiveDate, #[case] expected: (i32, u32)) {
        assert_eq!(week_of_year(date), expected);
    }

    #[test]
    fn test_week_and_month_boundaries() {
        // Wednesday
        let date = d(2024, 3, 6);
        assert_eq!(start_of_week(date), d(2024, 3, 4));
        assert_eq!(end_of_week(date), d(2024, 3, 10));
        assert_eq!(start_of_month(date), d(2024, 3, 1));
        assert_eq!(end_of_month(date), d(2024, 3, 31));
        assert_eq!(end_of_month(d(2024, 2, 10)), d(2024, 2, 29));
    }

    #[rstest]
    #[case(2024, 2, 29)]
    #[case(2023, 2, 28)]
    #[case(2024, 4, 30)]
    #[case(2024, 12, 31)]
    #[case(2024, 13, 0)]
    fn test_days_in_month(#[case] year: i32, #[case] month: u32, #[case] expected: u32) {
        assert_eq!(days_in_month(year, month), expected);
    }

    #[test]
    fn test_is_within() {
        let start = d(2024, 1, 1);
        assert!(is_within(d(2024, 1, 1), start, None));
        assert!(is_within(d(2030, 1, 1), start, None));
        assert!(!is_within(d(2023, 12, 31), start, None));
        assert!(is_within(d(2024, 1, 31), start, Some(d(2024, 1, 31))));
        assert!(!is_within(d(2024, 2, 1), start, Some(d(2024, 1, 31))));
    }

    #[test]
    fn test_months_between() {
        assert_eq!(months_between(d(2024, 1, 31), d(2024, 3, 1)), 2);
        assert_eq!(months_between(d(2023, 11, 15), d(2024, 2, 15)), 3);
        assert_eq!(months_between(d(2024, 3, 1), d(2024, 1, 1)), -2);
    }

    #[test]
    fn test_month_grid_covers_whole_weeks() {
        let grid = month_grid(d(2024, 3, 15));
        assert_eq!(grid.first(), Some(&d(2024, 2, 26)));
        assert_eq!(grid.last(), Some(&d(2024, 3, 31)));
        assert_eq!(grid.len() % 7, 0);
    }
}
