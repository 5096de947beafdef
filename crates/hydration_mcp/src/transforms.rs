//! Presentation helpers: milliliter series rendered alongside liters.

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::Serialize;

use hydration_core::{AggregatedSeries, Granularity};

/// Milliliters to liters, rounded to two decimals.
pub fn ml_to_liters(ml: u64) -> f64 {
    (ml as f64 / 10.0).round() / 100.0
}

/// Human-readable volume, e.g. `"1.25 L"` or `"300 ml"`.
pub fn format_volume(ml: u64) -> String {
    if ml >= 1000 {
        format!("{:.2} L", ml_to_liters(ml))
    } else {
        format!("{ml} ml")
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SeriesView {
    pub granularity: Granularity,
    #[schemars(with = "String")]
    pub anchor: NaiveDate,
    pub labels: Vec<String>,
    pub values_ml: Vec<u64>,
    pub values_l: Vec<f64>,
    pub total_ml: u64,
    pub total_l: f64,
}

impl From<AggregatedSeries> for SeriesView {
    fn from(series: AggregatedSeries) -> Self {
        let total_ml = series.total_ml();
        Self {
            granularity: series.granularity,
            anchor: series.anchor,
            values_l: series.values_ml.iter().map(|v| ml_to_liters(*v)).collect(),
            labels: series.labels,
            values_ml: series.values_ml,
            total_ml,
            total_l: ml_to_liters(total_ml),
        }
    }
}
