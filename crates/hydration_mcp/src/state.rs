use chrono::NaiveDate;
use hydration_core::AggregatedSeries;
use schemars::JsonSchema;
use serde::Serialize;

#[derive(Debug, Serialize, JsonSchema, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Active,
    /// Replaced by a newer subscription for the same key, or unsubscribed.
    Cancelled,
    /// The store stopped publishing for this key.
    Closed,
}

#[derive(Debug, Serialize, JsonSchema, Clone)]
pub struct SubscriptionStatus {
    pub id: String,
    pub user_id: String,
    #[schemars(with = "String")]
    pub date: NaiveDate,
    pub state: SubscriptionState,
    /// Recomputations triggered by store pushes since subscribing
    pub updates: u64,
    pub created_at: String,
    pub series: AggregatedSeries,
}
