use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use hydration_core::catalog::DrinkType;
use hydration_core::{DayRecord, StreakState, StreakTransition, UserProfile};

use crate::state::SubscriptionStatus;

// === Parameters ===

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct UserIdParam {
    pub user_id: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct OnboardingParams {
    pub user_id: String,
    #[serde(flatten)]
    pub profile: UserProfile,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct SetGoalParams {
    pub user_id: String,
    /// New daily goal in milliliters (must be positive)
    pub daily_goal_ml: u32,
}

/// A drink to log. Date and time default to the current local clock.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct DrinkRequest {
    pub amount_ml: u32,
    /// Catalog id (see list_drink_types), default "water"
    pub drink_type: Option<String>,
    /// YYYY-MM-DD
    pub date: Option<String>,
    /// HH:MM or HH:MM:SS
    pub time: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct LogDrinkParams {
    pub user_id: String,
    #[serde(flatten)]
    pub drink: DrinkRequest,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct DayParams {
    pub user_id: String,
    /// YYYY-MM-DD, default today
    pub date: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct SeriesParams {
    pub user_id: String,
    /// One of day, week, month, year
    pub granularity: String,
    /// Any date inside the period to show, default today
    pub anchor: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct SummaryParams {
    pub user_id: String,
    /// Reference date for the comparison windows, default today
    pub today: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct SubscriptionIdParam {
    pub subscription_id: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct HydrationReviewParams {
    pub user_id: String,
    pub focus: Option<String>,
}

// === Results ===

#[derive(Debug, Serialize, JsonSchema)]
pub struct GoalResult {
    pub daily_goal_ml: u32,
    pub daily_goal_l: f64,
}

/// Settings with the effective goal resolved.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SettingsView {
    pub user_id: String,
    pub profile: Option<UserProfile>,
    pub daily_goal_ml: u32,
    /// True when no goal was stored and the configured default applies
    pub goal_is_default: bool,
    pub streak: StreakState,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct LoggedDrink {
    pub record: DayRecord,
    pub daily_goal_ml: u32,
    pub progress_percent: u32,
    pub streak: StreakState,
    /// Present only when the drink was logged for today
    pub streak_transition: Option<StreakTransition>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct DayRecordResult {
    #[schemars(with = "String")]
    pub date: NaiveDate,
    pub record: Option<DayRecord>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct DrinkTypesResult {
    pub drink_types: Vec<DrinkType>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SubscriptionStartResult {
    pub subscription_id: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SubscriptionStatusResult {
    pub status: SubscriptionStatus,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SubscriptionListResult {
    pub subscriptions: Vec<SubscriptionStatus>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct UnsubscribeResult {
    pub cancelled: bool,
}
