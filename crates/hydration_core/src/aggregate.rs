//! Time-bucketed intake views.
//!
//! Every view is recomputed from the supplied day records on each call and
//! keeps no state between calls. Sums are integer milliliters; converting to
//! liters is left to whoever renders the series.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate, Timelike, Weekday};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::utils::{date_range, days_in_month, first_of_month, last_of_month, week_bounds};
use crate::{DayRecord, HydrationError};

pub const DAY_SLOT_HOURS: u32 = 4;
pub const DAY_SLOTS: usize = 6;
pub const MONTH_RUN_DAYS: u32 = 5;

pub const DAY_SLOT_LABELS: [&str; DAY_SLOTS] = [
    "00:00-04:00",
    "04:00-08:00",
    "08:00-12:00",
    "12:00-16:00",
    "16:00-20:00",
    "20:00-24:00",
];

const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
    Year,
}

impl FromStr for Granularity {
    type Err = HydrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Granularity::Day),
            "week" => Ok(Granularity::Week),
            "month" => Ok(Granularity::Month),
            "year" => Ok(Granularity::Year),
            other => Err(HydrationError::InvalidInput(format!(
                "unknown granularity: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Monday,
    Sunday,
}

impl WeekStart {
    pub fn weekday(self) -> Weekday {
        match self {
            WeekStart::Monday => Weekday::Mon,
            WeekStart::Sunday => Weekday::Sun,
        }
    }
}

impl FromStr for WeekStart {
    type Err = HydrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monday" | "mon" => Ok(WeekStart::Monday),
            "sunday" | "sun" => Ok(WeekStart::Sunday),
            other => Err(HydrationError::Config(format!(
                "week start must be monday or sunday, got {other}"
            ))),
        }
    }
}

/// A fixed-length run of buckets with parallel labels.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct AggregatedSeries {
    pub granularity: Granularity,
    #[schemars(with = "String")]
    pub anchor: NaiveDate,
    pub labels: Vec<String>,
    pub values_ml: Vec<u64>,
}

impl AggregatedSeries {
    pub fn total_ml(&self) -> u64 {
        self.values_ml.iter().sum()
    }
}

/// Read access to day records by date.
pub trait DayLookup {
    fn day(&self, date: NaiveDate) -> Option<&DayRecord>;

    /// Authoritative total for `date`, 0 when there is no record.
    fn total_ml(&self, date: NaiveDate) -> u64 {
        self.day(date).map(|r| r.total_amount_ml).unwrap_or(0)
    }
}

impl DayLookup for BTreeMap<NaiveDate, DayRecord> {
    fn day(&self, date: NaiveDate) -> Option<&DayRecord> {
        self.get(&date)
    }
}

impl DayLookup for HashMap<NaiveDate, DayRecord> {
    fn day(&self, date: NaiveDate) -> Option<&DayRecord> {
        self.get(&date)
    }
}

impl DayLookup for [DayRecord] {
    fn day(&self, date: NaiveDate) -> Option<&DayRecord> {
        self.iter().find(|r| r.date == date)
    }
}

/// Inclusive date range a view over `anchor` reads from.
pub fn window(granularity: Granularity, anchor: NaiveDate, week_start: WeekStart) -> (NaiveDate, NaiveDate) {
    match granularity {
        Granularity::Day => (anchor, anchor),
        Granularity::Week => week_bounds(anchor, week_start.weekday()),
        Granularity::Month => (first_of_month(anchor), last_of_month(anchor)),
        Granularity::Year => {
            let y = anchor.year();
            (
                NaiveDate::from_ymd_opt(y, 1, 1).unwrap_or(anchor),
                NaiveDate::from_ymd_opt(y, 12, 31).unwrap_or(anchor),
            )
        }
    }
}

pub fn aggregate<L: DayLookup + ?Sized>(
    granularity: Granularity,
    anchor: NaiveDate,
    days: &L,
    week_start: WeekStart,
) -> AggregatedSeries {
    match granularity {
        Granularity::Day => day_series(anchor, days.day(anchor)),
        Granularity::Week => week_series(anchor, days, week_start),
        Granularity::Month => month_series(anchor, days),
        Granularity::Year => year_series(anchor, days),
    }
}

fn slot_of(hour: u32) -> usize {
    ((hour / DAY_SLOT_HOURS) as usize).min(DAY_SLOTS - 1)
}

/// Six 4-hour buckets for one day's record.
///
/// Events are bucketed by hour, each capped at whatever part of the
/// authoritative total is still unassigned. Any part of the total the events
/// do not cover lands in the bucket of the last drink, so the buckets always
/// sum to `total_amount_ml`.
pub fn day_buckets(record: Option<&DayRecord>) -> [u64; DAY_SLOTS] {
    let mut buckets = [0u64; DAY_SLOTS];
    let Some(record) = record else {
        return buckets;
    };

    let mut remaining = record.total_amount_ml;
    for event in &record.events {
        let amount = u64::from(event.amount_ml).min(remaining);
        buckets[slot_of(event.time.hour())] += amount;
        remaining -= amount;
    }

    if remaining > 0 {
        let slot = record
            .last_drink_time
            .or_else(|| record.events.last().map(|e| e.time))
            .map(|t| slot_of(t.hour()))
            .unwrap_or(0);
        buckets[slot] += remaining;
    }

    buckets
}

pub fn day_series(anchor: NaiveDate, record: Option<&DayRecord>) -> AggregatedSeries {
    AggregatedSeries {
        granularity: Granularity::Day,
        anchor,
        labels: DAY_SLOT_LABELS.iter().map(|s| s.to_string()).collect(),
        values_ml: day_buckets(record).to_vec(),
    }
}

fn week_series<L: DayLookup + ?Sized>(
    anchor: NaiveDate,
    days: &L,
    week_start: WeekStart,
) -> AggregatedSeries {
    let (start, _) = week_bounds(anchor, week_start.weekday());
    let first = start.weekday().num_days_from_monday() as usize;
    AggregatedSeries {
        granularity: Granularity::Week,
        anchor,
        labels: (0..7)
            .map(|i| WEEKDAY_LABELS[(first + i) % 7].to_string())
            .collect(),
        // days past the end of the calendar count as empty
        values_ml: (0..7u64)
            .map(|i| {
                start
                    .checked_add_days(Days::new(i))
                    .map_or(0, |d| days.total_ml(d))
            })
            .collect(),
    }
}

fn month_series<L: DayLookup + ?Sized>(anchor: NaiveDate, days: &L) -> AggregatedSeries {
    let daily: Vec<u64> = date_range(first_of_month(anchor), last_of_month(anchor))
        .map(|d| days.total_ml(d))
        .collect();

    let mut labels = Vec::new();
    let mut values_ml = Vec::new();
    for (i, run) in daily.chunks(MONTH_RUN_DAYS as usize).enumerate() {
        labels.push((i as u32 * MONTH_RUN_DAYS + 1).to_string());
        values_ml.push(run.iter().sum());
    }
    debug_assert_eq!(
        values_ml.len(),
        days_in_month(anchor).div_ceil(MONTH_RUN_DAYS) as usize
    );

    AggregatedSeries {
        granularity: Granularity::Month,
        anchor,
        labels,
        values_ml,
    }
}

fn year_series<L: DayLookup + ?Sized>(anchor: NaiveDate, days: &L) -> AggregatedSeries {
    let mut values_ml = Vec::with_capacity(12);
    for month in 1..=12 {
        let total = NaiveDate::from_ymd_opt(anchor.year(), month, 1)
            .map(|first| {
                date_range(first, last_of_month(first))
                    .map(|d| days.total_ml(d))
                    .sum()
            })
            .unwrap_or(0);
        values_ml.push(total);
    }
    AggregatedSeries {
        granularity: Granularity::Year,
        anchor,
        labels: MONTH_LABELS.iter().map(|s| s.to_string()).collect(),
        values_ml,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DayLog, DrinkEvent};
    use chrono::NaiveTime;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn drink(amount_ml: u32, h: u32, m: u32) -> DrinkEvent {
        DrinkEvent {
            amount_ml,
            drink_type: "water".into(),
            time: NaiveTime::from_hms_opt(h, m, 0).unwrap(),
        }
    }

    fn record(date: NaiveDate, drinks: Vec<DrinkEvent>) -> DayRecord {
        let mut r = DayRecord::empty(date);
        for e in drinks {
            r.append(e);
        }
        r
    }

    #[test]
    fn day_view_buckets_by_hour() {
        let r = record(
            d(2025, 3, 5),
            vec![drink(250, 7, 59), drink(300, 8, 0), drink(200, 23, 30), drink(100, 0, 5)],
        );
        let s = day_series(r.date, Some(&r));
        assert_eq!(s.values_ml, vec![100, 250, 300, 0, 0, 200]);
        assert_eq!(s.labels[2], "08:00-12:00");
    }

    #[test]
    fn legacy_total_without_events_goes_to_last_drink_slot() {
        let r = DayRecord {
            date: d(2025, 3, 5),
            total_amount_ml: 1200,
            last_drink_time: Some(NaiveTime::from_hms_opt(17, 45, 0).unwrap()),
            events: vec![],
        };
        assert_eq!(day_buckets(Some(&r)), [0, 0, 0, 0, 1200, 0]);
    }

    #[test]
    fn lagging_total_caps_event_buckets() {
        // total was written before the second event landed in the list
        let mut r = record(d(2025, 3, 5), vec![drink(300, 9, 0), drink(200, 13, 0)]);
        r.total_amount_ml = 400;
        let buckets = day_buckets(Some(&r));
        assert_eq!(buckets, [0, 0, 300, 100, 0, 0]);
        assert_eq!(buckets.iter().sum::<u64>(), 400);
    }

    #[test]
    fn week_view_starts_monday_and_defaults_to_zero() {
        let mut log = DayLog::new();
        let wed = d(2025, 3, 5);
        log.insert(wed, record(wed, vec![drink(800, 10, 0)]));
        let sun = d(2025, 3, 9);
        log.insert(sun, record(sun, vec![drink(400, 10, 0)]));
        // next Monday belongs to another week
        let next_mon = d(2025, 3, 10);
        log.insert(next_mon, record(next_mon, vec![drink(999, 10, 0)]));

        let s = aggregate(Granularity::Week, wed, &log, WeekStart::Monday);
        assert_eq!(s.labels, vec!["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]);
        assert_eq!(s.values_ml, vec![0, 0, 800, 0, 0, 0, 400]);
    }

    #[test]
    fn sunday_week_start_rotates_labels() {
        let log = DayLog::new();
        let s = aggregate(Granularity::Week, d(2025, 3, 5), &log, WeekStart::Sunday);
        assert_eq!(s.labels[0], "Sun");
        assert_eq!(s.labels[6], "Sat");
    }

    #[test]
    fn month_view_folds_five_day_runs() {
        let mut log = DayLog::new();
        for day in 1..=31 {
            let date = d(2025, 1, day);
            log.insert(date, record(date, vec![drink(100, 12, 0)]));
        }
        let s = aggregate(Granularity::Month, d(2025, 1, 15), &log, WeekStart::Monday);
        assert_eq!(s.labels, vec!["1", "6", "11", "16", "21", "26", "31"]);
        assert_eq!(s.values_ml, vec![500, 500, 500, 500, 500, 500, 100]);
    }

    #[test]
    fn february_has_six_runs() {
        let log = DayLog::new();
        let s = aggregate(Granularity::Month, d(2025, 2, 1), &log, WeekStart::Monday);
        assert_eq!(s.values_ml.len(), 6);
        assert_eq!(s.labels.last().map(String::as_str), Some("26"));
    }

    #[test]
    fn year_view_sums_months() {
        let mut log = DayLog::new();
        for date in [d(2025, 1, 3), d(2025, 1, 20), d(2025, 12, 31), d(2024, 12, 31)] {
            log.insert(date, record(date, vec![drink(500, 12, 0)]));
        }
        let s = aggregate(Granularity::Year, d(2025, 6, 1), &log, WeekStart::Monday);
        assert_eq!(s.values_ml.len(), 12);
        assert_eq!(s.values_ml[0], 1000);
        assert_eq!(s.values_ml[11], 500);
        assert_eq!(s.total_ml(), 1500);
    }

    #[test]
    fn granularity_parses_case_insensitively() {
        assert_eq!("Week".parse::<Granularity>().unwrap(), Granularity::Week);
        assert!("fortnight".parse::<Granularity>().is_err());
    }

    #[test]
    fn windows_cover_the_view() {
        assert_eq!(
            window(Granularity::Month, d(2024, 2, 10), WeekStart::Monday),
            (d(2024, 2, 1), d(2024, 2, 29))
        );
        assert_eq!(
            window(Granularity::Year, d(2024, 2, 10), WeekStart::Monday),
            (d(2024, 1, 1), d(2024, 12, 31))
        );
    }
}
