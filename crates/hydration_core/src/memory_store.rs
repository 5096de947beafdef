//! Process-local [`HydrationStore`] backed by tokio locks and watch channels,
//! optionally seeded from a JSON export of the document store.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};

use crate::catalog::{DRINK_TYPES, DEFAULT_DRINK_TYPE};
use crate::utils::{parse_clock_time, parse_date};
use crate::{
    ActivityLevel, Climate, DayLog, DayRecord, DrinkEvent, HydrationError, HydrationStore,
    PhysiologicalCategory, StreakState, StreakTransition, UserProfile, UserSettings,
};

type WatchKey = (String, NaiveDate);

#[derive(Default)]
struct StoreState {
    settings: HashMap<String, UserSettings>,
    days: HashMap<String, DayLog>,
    watchers: HashMap<WatchKey, watch::Sender<Option<DayRecord>>>,
}

impl StoreState {
    fn notify(&mut self, user_id: &str, record: &DayRecord) {
        let key = (user_id.to_string(), record.date);
        if let Some(tx) = self.watchers.get(&key) {
            if tx.receiver_count() == 0 {
                self.watchers.remove(&key);
            } else {
                tx.send_replace(Some(record.clone()));
            }
        }
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a whole day record. Used for seeding.
    pub async fn insert_day(&self, user_id: &str, record: DayRecord) {
        let mut state = self.state.write().await;
        state
            .days
            .entry(user_id.to_string())
            .or_default()
            .insert(record.date, record.clone());
        state.notify(user_id, &record);
    }

    pub async fn user_count(&self) -> usize {
        let state = self.state.read().await;
        let mut ids: Vec<&String> = state.settings.keys().chain(state.days.keys()).collect();
        ids.sort();
        ids.dedup();
        ids.len()
    }

    /// Build a store from an export shaped
    /// `{ "users": { uid: {...} }, "waterLog": { uid: { "YYYY-MM-DD": {...} } } }`.
    ///
    /// Entries that cannot be interpreted are skipped with a warning.
    pub fn from_export(value: &Value) -> Result<Self, HydrationError> {
        let doc = ExportDocument::deserialize(value)?;
        let mut state = StoreState::default();

        for (uid, user) in doc.users {
            state.settings.insert(uid.clone(), user.into_settings(&uid));
        }

        let mut skipped = 0usize;
        for (uid, days) in doc.water_log {
            let log = state.days.entry(uid.clone()).or_default();
            for (key, day) in days {
                let Some(date) = parse_date(&key) else {
                    warn!(user_id = %uid, key = %key, "skipping export entry with unparseable date key");
                    skipped += 1;
                    continue;
                };
                log.insert(date, day.into_record(date));
            }
        }

        info!(
            users = state.settings.len(),
            logs = state.days.len(),
            skipped,
            "loaded hydration export"
        );
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    pub async fn load_export_file(path: impl AsRef<Path>) -> Result<Self, HydrationError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "reading hydration export");
        let raw = tokio::fs::read_to_string(path).await?;
        let value: Value = serde_json::from_str(&raw)?;
        Self::from_export(&value)
    }
}

#[async_trait]
impl HydrationStore for InMemoryStore {
    async fn get_settings(&self, user_id: &str) -> Result<UserSettings, HydrationError> {
        Ok(self
            .state
            .read()
            .await
            .settings
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn put_profile(
        &self,
        user_id: &str,
        profile: UserProfile,
        daily_goal_ml: u32,
    ) -> Result<UserSettings, HydrationError> {
        if daily_goal_ml == 0 {
            return Err(HydrationError::InvalidInput(
                "daily goal must be positive".into(),
            ));
        }
        let mut state = self.state.write().await;
        let settings = state.settings.entry(user_id.to_string()).or_default();
        settings.profile = Some(profile);
        settings.daily_goal_ml = Some(daily_goal_ml);
        Ok(settings.clone())
    }

    async fn set_daily_goal(
        &self,
        user_id: &str,
        daily_goal_ml: u32,
    ) -> Result<UserSettings, HydrationError> {
        if daily_goal_ml == 0 {
            return Err(HydrationError::InvalidInput(
                "daily goal must be positive".into(),
            ));
        }
        let mut state = self.state.write().await;
        let settings = state.settings.entry(user_id.to_string()).or_default();
        settings.daily_goal_ml = Some(daily_goal_ml);
        Ok(settings.clone())
    }

    async fn advance_streak(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<(StreakState, StreakTransition), HydrationError> {
        let mut state = self.state.write().await;
        let settings = state.settings.entry(user_id.to_string()).or_default();
        let (next, transition) = settings.streak.advance(today);
        settings.streak = next;
        Ok((next, transition))
    }

    async fn get_day(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DayRecord>, HydrationError> {
        Ok(self
            .state
            .read()
            .await
            .days
            .get(user_id)
            .and_then(|log| log.get(&date))
            .cloned())
    }

    async fn get_days(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DayLog, HydrationError> {
        if start > end {
            return Ok(DayLog::new());
        }
        let state = self.state.read().await;
        Ok(state
            .days
            .get(user_id)
            .map(|log| {
                log.range(start..=end)
                    .map(|(d, r)| (*d, r.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn append_drink(
        &self,
        user_id: &str,
        date: NaiveDate,
        event: DrinkEvent,
    ) -> Result<DayRecord, HydrationError> {
        if event.amount_ml == 0 {
            return Err(HydrationError::InvalidInput(
                "drink amount must be positive".into(),
            ));
        }
        let mut state = self.state.write().await;
        let record = {
            let record = state
                .days
                .entry(user_id.to_string())
                .or_default()
                .entry(date)
                .or_insert_with(|| DayRecord::empty(date));
            record.append(event);
            record.clone()
        };
        state.notify(user_id, &record);
        Ok(record)
    }

    async fn watch_day(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<watch::Receiver<Option<DayRecord>>, HydrationError> {
        let mut state = self.state.write().await;
        let current = state
            .days
            .get(user_id)
            .and_then(|log| log.get(&date))
            .cloned();
        let key = (user_id.to_string(), date);
        // an existing sender already holds the current record
        let tx = state
            .watchers
            .entry(key)
            .or_insert_with(|| watch::channel(current).0);
        Ok(tx.subscribe())
    }
}

// ---------------------------------------------------------------------------
// Export document

#[derive(Debug, Default, Deserialize)]
struct ExportDocument {
    #[serde(default)]
    users: HashMap<String, ExportUser>,
    #[serde(default, rename = "waterLog")]
    water_log: HashMap<String, HashMap<String, ExportDay>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportUser {
    #[serde(default, deserialize_with = "deserialize_lenient_number")]
    daily_water_goal: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_number")]
    weight: Option<f64>,
    #[serde(default)]
    gender: Option<PhysiologicalCategory>,
    #[serde(default, alias = "activityLevel")]
    activity: Option<ActivityLevel>,
    #[serde(default)]
    climate: Option<Climate>,
    #[serde(default, deserialize_with = "deserialize_lenient_number")]
    streak: Option<f64>,
    #[serde(default)]
    last_active_date: Option<String>,
}

impl ExportUser {
    fn into_settings(self, uid: &str) -> UserSettings {
        let profile = match (self.weight, self.gender, self.activity, self.climate) {
            (Some(weight_kg), Some(category), Some(activity), Some(climate))
                if weight_kg > 0.0
                    && category != PhysiologicalCategory::Unknown
                    && activity != ActivityLevel::Unknown
                    && climate != Climate::Unknown =>
            {
                Some(UserProfile {
                    weight_kg,
                    physiological_category: category,
                    activity_level: activity,
                    climate,
                })
            }
            _ => {
                debug!(user_id = %uid, "export user has no complete profile");
                None
            }
        };
        let daily_goal_ml = self
            .daily_water_goal
            .filter(|g| *g >= 1.0 && *g <= f64::from(u32::MAX))
            .map(|g| g.round() as u32);
        let streak = StreakState {
            count: self
                .streak
                .filter(|s| *s >= 0.0)
                .map(|s| s.min(f64::from(u32::MAX)) as u32)
                .unwrap_or(0),
            last_active_date: self.last_active_date.as_deref().and_then(parse_date),
        };
        UserSettings {
            profile,
            daily_goal_ml,
            streak,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportDay {
    #[serde(default, deserialize_with = "deserialize_lenient_number")]
    amount: Option<f64>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    drinks: Vec<ExportDrink>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportDrink {
    #[serde(default, deserialize_with = "deserialize_lenient_number")]
    amount: Option<f64>,
    #[serde(default, alias = "type")]
    drink_type: Option<String>,
    #[serde(default)]
    time: Option<String>,
}

impl ExportDay {
    fn into_record(self, date: NaiveDate) -> DayRecord {
        let mut events = Vec::with_capacity(self.drinks.len());
        for drink in self.drinks {
            let amount = drink.amount.filter(|a| *a >= 1.0).map(|a| a.round() as u32);
            let time = drink.time.as_deref().and_then(parse_clock_time);
            match (amount, time) {
                (Some(amount_ml), Some(time)) => events.push(DrinkEvent {
                    amount_ml,
                    drink_type: normalize_drink_type(drink.drink_type.as_deref()),
                    time,
                }),
                _ => warn!(%date, "skipping export drink without amount or time"),
            }
        }

        let event_sum: u64 = events.iter().map(|e| u64::from(e.amount_ml)).sum();
        let total_amount_ml = self
            .amount
            .filter(|a| *a >= 0.0)
            .map(|a| a.round() as u64)
            .unwrap_or(event_sum);
        let last_drink_time: Option<NaiveTime> = events
            .iter()
            .map(|e| e.time)
            .max()
            .or_else(|| self.updated_at.as_deref().and_then(parse_clock_time));

        DayRecord {
            date,
            total_amount_ml,
            last_drink_time,
            events,
        }
    }
}

/// Exports store either catalog ids or display names; map both to ids.
fn normalize_drink_type(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return DEFAULT_DRINK_TYPE.to_string();
    };
    DRINK_TYPES
        .iter()
        .find(|t| t.id == raw || t.name.eq_ignore_ascii_case(raw))
        .map(|t| t.id.to_string())
        .unwrap_or_else(|| raw.to_ascii_lowercase())
}

/// Accepts a JSON number, a numeric string, or null.
fn deserialize_lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(match v {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite()))
}
