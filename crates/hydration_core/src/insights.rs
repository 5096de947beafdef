//! Comparative metrics over trailing and preceding windows.
//!
//! All functions take `today` explicitly and read only from the supplied
//! lookup, so they are deterministic for a given input.

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::aggregate::{DAY_SLOT_LABELS, DayLookup, WeekStart, day_buckets};
use crate::utils::{
    date_range, days_in_month, first_of_month, last_of_month, previous_month, shift_days,
    week_bounds,
};

/// Length of each window compared by [`daily_average`].
pub const AVERAGE_WINDOW_DAYS: i64 = 30;

/// Direction and non-negative magnitude of a change between two periods.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct PeriodChange {
    pub percentage: u32,
    pub is_increase: bool,
}

impl PeriodChange {
    /// Relative change in percent. A zero baseline reports a flat 100%
    /// increase when there is current data and no change otherwise.
    pub fn relative(current: f64, previous: f64) -> Self {
        if previous > 0.0 {
            let change = (current - previous) / previous * 100.0;
            Self {
                percentage: change.abs().round() as u32,
                is_increase: change > 0.0,
            }
        } else if current > 0.0 {
            Self {
                percentage: 100,
                is_increase: true,
            }
        } else {
            Self::default()
        }
    }

    /// Signed difference between two percentages, in points.
    pub fn points(current: u32, previous: u32) -> Self {
        let diff = i64::from(current) - i64::from(previous);
        Self {
            percentage: diff.unsigned_abs() as u32,
            is_increase: diff > 0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct DailyAverage {
    pub average_ml: f64,
    pub days_with_data: u32,
    pub previous_average_ml: f64,
    pub change: PeriodChange,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct WeeklyTotal {
    pub total_ml: u64,
    pub previous_total_ml: u64,
    pub change: PeriodChange,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct GoalCompletion {
    pub target_ml: u64,
    pub total_ml: u64,
    pub percentage: u32,
    pub previous_percentage: u32,
    pub change: PeriodChange,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct TimeOfDayExtremes {
    pub best_index: usize,
    pub best_label: String,
    pub worst_index: usize,
    pub worst_label: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct MonthToDate {
    pub average_ml: f64,
    pub days_with_data: u32,
    pub previous_average_ml: f64,
    pub change: PeriodChange,
}

/// Everything the analysis view shows, computed in one pass.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct HydrationSummary {
    #[schemars(with = "String")]
    pub today: NaiveDate,
    pub daily_goal_ml: u32,
    pub today_total_ml: u64,
    pub today_progress_percent: u32,
    pub daily_average: DailyAverage,
    pub weekly_total: WeeklyTotal,
    pub monthly_goal: GoalCompletion,
    pub consistency: GoalCompletion,
    pub time_of_day: Option<TimeOfDayExtremes>,
    pub month_to_date: MonthToDate,
}

/// Sum and count of positive days in `start..=end`.
fn positive_days<L: DayLookup + ?Sized>(days: &L, start: NaiveDate, end: NaiveDate) -> (u64, u32) {
    date_range(start, end)
        .map(|d| days.total_ml(d))
        .filter(|t| *t > 0)
        .fold((0, 0), |(sum, n), t| (sum + t, n + 1))
}

fn mean(sum: u64, count: u32) -> f64 {
    if count == 0 { 0.0 } else { sum as f64 / f64::from(count) }
}

fn range_total<L: DayLookup + ?Sized>(days: &L, start: NaiveDate, end: NaiveDate) -> u64 {
    date_range(start, end).map(|d| days.total_ml(d)).sum()
}

/// Average intake over days with data in the trailing 30 days, against the
/// 30 days before that.
pub fn daily_average<L: DayLookup + ?Sized>(days: &L, today: NaiveDate) -> DailyAverage {
    let current_start = shift_days(today, -(AVERAGE_WINDOW_DAYS - 1));
    let previous_end = shift_days(current_start, -1);
    let previous_start = shift_days(previous_end, -(AVERAGE_WINDOW_DAYS - 1));

    let (sum, n) = positive_days(days, current_start, today);
    let (prev_sum, prev_n) = positive_days(days, previous_start, previous_end);
    let average_ml = mean(sum, n);
    let previous_average_ml = mean(prev_sum, prev_n);

    DailyAverage {
        average_ml,
        days_with_data: n,
        previous_average_ml,
        change: PeriodChange::relative(average_ml, previous_average_ml),
    }
}

/// Total of the week containing `today` against the week before it.
pub fn weekly_total<L: DayLookup + ?Sized>(
    days: &L,
    today: NaiveDate,
    week_start: WeekStart,
) -> WeeklyTotal {
    let (start, end) = week_bounds(today, week_start.weekday());
    let total_ml = range_total(days, start, end);
    let previous_total_ml = range_total(days, shift_days(start, -7), shift_days(end, -7));
    WeeklyTotal {
        total_ml,
        previous_total_ml,
        change: PeriodChange::relative(total_ml as f64, previous_total_ml as f64),
    }
}

/// Rounded share of `target_ml` reached, 0 for a zero target.
pub fn completion_percent(total_ml: u64, target_ml: u64) -> u32 {
    if target_ml == 0 {
        return 0;
    }
    (total_ml as f64 / target_ml as f64 * 100.0).round() as u32
}

/// Share of the whole-month target reached in the month of `today`, against
/// the previous month measured by its own length.
pub fn monthly_goal_completion<L: DayLookup + ?Sized>(
    days: &L,
    today: NaiveDate,
    daily_goal_ml: u32,
) -> GoalCompletion {
    let target_ml = u64::from(daily_goal_ml) * u64::from(days_in_month(today));
    let total_ml = range_total(days, first_of_month(today), last_of_month(today));

    let prev = previous_month(today);
    let previous_target = u64::from(daily_goal_ml) * u64::from(days_in_month(prev));
    let previous_total = range_total(days, prev, last_of_month(prev));

    let percentage = completion_percent(total_ml, target_ml);
    let previous_percentage = completion_percent(previous_total, previous_target);

    GoalCompletion {
        target_ml,
        total_ml,
        percentage,
        previous_percentage,
        change: PeriodChange::points(percentage, previous_percentage),
    }
}

/// Consistency is reported with the same ratio as monthly goal completion.
pub fn consistency<L: DayLookup + ?Sized>(
    days: &L,
    today: NaiveDate,
    daily_goal_ml: u32,
) -> GoalCompletion {
    monthly_goal_completion(days, today, daily_goal_ml)
}

/// Best (first maximum) and worst (first smallest non-zero, or the first
/// bucket when all are zero) slots of a day view.
pub fn best_worst_time(buckets: &[u64]) -> Option<TimeOfDayExtremes> {
    let first = *buckets.first()?;
    let (mut best, mut best_v) = (0, first);
    let (mut worst, mut worst_v) = (0, first);

    for (i, &v) in buckets.iter().enumerate().skip(1) {
        if v > best_v {
            best = i;
            best_v = v;
        }
        if v > 0 && (worst_v == 0 || v < worst_v) {
            worst = i;
            worst_v = v;
        }
    }

    let label = |i: usize| {
        DAY_SLOT_LABELS
            .get(i)
            .map(|s| s.to_string())
            .unwrap_or_else(|| i.to_string())
    };
    Some(TimeOfDayExtremes {
        best_index: best,
        best_label: label(best),
        worst_index: worst,
        worst_label: label(worst),
    })
}

/// Average of the current month up to `today` against the whole previous month.
pub fn month_to_date<L: DayLookup + ?Sized>(days: &L, today: NaiveDate) -> MonthToDate {
    let (sum, n) = positive_days(days, first_of_month(today), today);
    let prev = previous_month(today);
    let (prev_sum, prev_n) = positive_days(days, prev, last_of_month(prev));
    let average_ml = mean(sum, n);
    let previous_average_ml = mean(prev_sum, prev_n);
    MonthToDate {
        average_ml,
        days_with_data: n,
        previous_average_ml,
        change: PeriodChange::relative(average_ml, previous_average_ml),
    }
}

/// Inclusive range of dates [`summarize`] reads.
pub fn summary_window(today: NaiveDate, week_start: WeekStart) -> (NaiveDate, NaiveDate) {
    let average_start = shift_days(today, -(2 * AVERAGE_WINDOW_DAYS - 1));
    let (week_first, week_last) = week_bounds(today, week_start.weekday());
    let start = average_start
        .min(previous_month(today))
        .min(shift_days(week_first, -7));
    let end = last_of_month(today).max(week_last);
    (start, end)
}

pub fn summarize<L: DayLookup + ?Sized>(
    days: &L,
    today: NaiveDate,
    daily_goal_ml: u32,
    week_start: WeekStart,
) -> HydrationSummary {
    let today_total_ml = days.total_ml(today);
    let monthly_goal = monthly_goal_completion(days, today, daily_goal_ml);
    HydrationSummary {
        today,
        daily_goal_ml,
        today_total_ml,
        today_progress_percent: completion_percent(today_total_ml, u64::from(daily_goal_ml)),
        daily_average: daily_average(days, today),
        weekly_total: weekly_total(days, today, week_start),
        consistency: consistency(days, today, daily_goal_ml),
        monthly_goal,
        time_of_day: best_worst_time(&day_buckets(days.day(today))),
        month_to_date: month_to_date(days, today),
    }
}
