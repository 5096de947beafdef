use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Consecutive-day activity counter.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct StreakState {
    pub count: u32,
    #[schemars(with = "Option<String>")]
    pub last_active_date: Option<NaiveDate>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StreakTransition {
    Increment,
    NoOp,
    Reset,
}

impl StreakState {
    /// Record activity on `today`.
    pub fn advance(self, today: NaiveDate) -> (StreakState, StreakTransition) {
        match self.last_active_date {
            Some(last) if last == today => (self, StreakTransition::NoOp),
            Some(last) if today.pred_opt() == Some(last) => (
                StreakState {
                    count: self.count.saturating_add(1),
                    last_active_date: Some(today),
                },
                StreakTransition::Increment,
            ),
            _ => (
                StreakState {
                    count: 1,
                    last_active_date: Some(today),
                },
                StreakTransition::Reset,
            ),
        }
    }
}
