//! Hydration tracking core: goal calculation, intake aggregation and the
//! `HydrationStore` trait the service layer persists through.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod goal;
pub mod insights;
pub mod memory_store;
pub mod observability;
pub mod retry;
pub mod streak;
pub mod utils;

pub use aggregate::{AggregatedSeries, DayLookup, Granularity, WeekStart, aggregate};
pub use goal::compute_daily_goal;
pub use streak::{StreakState, StreakTransition};

#[derive(Debug, Error)]
pub enum HydrationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HydrationError {
    /// Only store failures are transient; everything else fails the same way twice.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HydrationError::Store(_))
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PhysiologicalCategory {
    Male,
    Female,
    Pregnant,
    Nursing,
    Other,
    #[serde(other)]
    Unknown,
}

impl PhysiologicalCategory {
    pub const ALL: [PhysiologicalCategory; 5] = [
        PhysiologicalCategory::Male,
        PhysiologicalCategory::Female,
        PhysiologicalCategory::Pregnant,
        PhysiologicalCategory::Nursing,
        PhysiologicalCategory::Other,
    ];
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    VeryActive,
    #[serde(other)]
    Unknown,
}

impl ActivityLevel {
    pub const ALL: [ActivityLevel; 4] = [
        ActivityLevel::Sedentary,
        ActivityLevel::Light,
        ActivityLevel::Moderate,
        ActivityLevel::VeryActive,
    ];
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Climate {
    Cold,
    Moderate,
    Hot,
    #[serde(other)]
    Unknown,
}

impl Climate {
    pub const ALL: [Climate; 3] = [Climate::Cold, Climate::Moderate, Climate::Hot];
}

/// Inputs to the daily goal calculation, as captured during onboarding.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct UserProfile {
    pub weight_kg: f64,
    pub physiological_category: PhysiologicalCategory,
    pub activity_level: ActivityLevel,
    pub climate: Climate,
}

/// One logged drink.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct DrinkEvent {
    /// Amount in milliliters
    pub amount_ml: u32,
    /// Catalog id of the beverage (see [`catalog::DRINK_TYPES`])
    pub drink_type: String,
    /// Local clock time the drink was recorded
    #[serde(deserialize_with = "deserialize_clock_time")]
    #[schemars(with = "String")]
    pub time: NaiveTime,
}

fn deserialize_clock_time<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let raw = String::deserialize(deserializer)?;
    utils::parse_clock_time(&raw)
        .ok_or_else(|| D::Error::custom(format!("unrecognized clock time: {raw}")))
}

/// All drinks logged on one local calendar date.
///
/// `total_amount_ml` is the authoritative figure: a reader may observe it
/// briefly out of step with `events` and must not re-derive it from them.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct DayRecord {
    #[schemars(with = "String")]
    pub date: NaiveDate,
    pub total_amount_ml: u64,
    #[schemars(with = "Option<String>")]
    pub last_drink_time: Option<NaiveTime>,
    #[serde(default)]
    pub events: Vec<DrinkEvent>,
}

impl DayRecord {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_amount_ml: 0,
            last_drink_time: None,
            events: Vec::new(),
        }
    }

    /// Append an event, updating the running total and last drink time together.
    pub fn append(&mut self, event: DrinkEvent) {
        self.total_amount_ml += u64::from(event.amount_ml);
        self.last_drink_time = Some(match self.last_drink_time {
            Some(last) if last > event.time => last,
            _ => event.time,
        });
        self.events.push(event);
    }
}

/// Date-ordered log of day records for one user.
pub type DayLog = BTreeMap<NaiveDate, DayRecord>;

/// Per-user document held by the store.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct UserSettings {
    pub profile: Option<UserProfile>,
    pub daily_goal_ml: Option<u32>,
    #[serde(default)]
    pub streak: StreakState,
}

#[async_trait]
pub trait HydrationStore: Send + Sync + 'static {
    /// Settings for a user. Unknown users get an empty document.
    async fn get_settings(&self, user_id: &str) -> Result<UserSettings, HydrationError>;

    /// Persist a completed onboarding: the profile and the goal derived from it.
    async fn put_profile(
        &self,
        user_id: &str,
        profile: UserProfile,
        daily_goal_ml: u32,
    ) -> Result<UserSettings, HydrationError>;

    /// Replace the daily goal without touching the profile.
    async fn set_daily_goal(
        &self,
        user_id: &str,
        daily_goal_ml: u32,
    ) -> Result<UserSettings, HydrationError>;

    /// Record activity on `today` and persist the advanced streak in one
    /// write. Returns the new state and how it changed.
    async fn advance_streak(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<(StreakState, StreakTransition), HydrationError>;

    async fn get_day(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DayRecord>, HydrationError>;

    /// Records with `start <= date <= end`.
    async fn get_days(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DayLog, HydrationError>;

    /// Append a drink to the given date in a single logical write and return
    /// the updated record.
    async fn append_drink(
        &self,
        user_id: &str,
        date: NaiveDate,
        event: DrinkEvent,
    ) -> Result<DayRecord, HydrationError>;

    /// Watch a single date key. The receiver holds the current record and
    /// observes every subsequent write to that date.
    async fn watch_day(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<tokio::sync::watch::Receiver<Option<DayRecord>>, HydrationError>;
}
