//! Date and clock-time helpers shared by the aggregator and the store.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};

/// Parse a calendar date.
///
/// Accepts:
/// - YYYY-MM-DD
/// - RFC3339 datetime (date part in its own offset)
/// - Naive datetime YYYY-MM-DDTHH:MM:SS
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(ndt.date());
    }
    None
}

/// Parse the clock time of a drink.
///
/// Accepts:
/// - HH:MM and HH:MM:SS
/// - RFC3339 datetime (local clock time of its offset)
/// - Naive datetime YYYY-MM-DDTHH:MM:SS
pub fn parse_clock_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    for fmt in ["%H:%M:%S", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(s, fmt) {
            return Some(t);
        }
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.time());
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(ndt.time());
    }
    None
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Number of days in the month containing `date`.
pub fn days_in_month(date: NaiveDate) -> u32 {
    let (y, m) = (date.year(), date.month());
    let next = if m == 12 {
        NaiveDate::from_ymd_opt(y + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(y, m + 1, 1)
    };
    match next {
        Some(n) => n.pred_opt().map(|d| d.day()).unwrap_or(31),
        None => 31,
    }
}

pub fn last_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(days_in_month(date)).unwrap_or(date)
}

/// First day of the month before the one containing `date`.
pub fn previous_month(date: NaiveDate) -> NaiveDate {
    first_of_month(first_of_month(date).pred_opt().unwrap_or(date))
}

/// `date` moved by `days`, saturating at the ends of the representable range.
pub fn shift_days(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(days))
        .unwrap_or(if days < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

/// Inclusive bounds of the 7-day week containing `date`. Clipped at the ends
/// of the representable range.
pub fn week_bounds(date: NaiveDate, first_day: Weekday) -> (NaiveDate, NaiveDate) {
    let offset = (7 + date.weekday().num_days_from_monday() - first_day.num_days_from_monday()) % 7;
    let start = shift_days(date, -i64::from(offset));
    (start, shift_days(start, 6))
}

/// Every date in `start..=end`.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}
