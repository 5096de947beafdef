use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate, NaiveDateTime};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use hydration_core::aggregate::{day_series, window};
use hydration_core::catalog::{self, DEFAULT_DRINK_TYPE};
use hydration_core::config::Config;
use hydration_core::insights::{HydrationSummary, completion_percent, summarize, summary_window};
use hydration_core::observability::{record_drink_logged, record_goal_computed};
use hydration_core::retry::RetryPolicy;
use hydration_core::utils::{parse_clock_time, parse_date};
use hydration_core::{
    DayLog, DrinkEvent, Granularity, HydrationStore, UserProfile, UserSettings, aggregate,
    compute_daily_goal,
};

use crate::error::{McpError, McpResult};
use crate::state::{SubscriptionState, SubscriptionStatus};
use crate::transforms::{SeriesView, format_volume};
use crate::types::{DayRecordResult, DrinkRequest, LoggedDrink, SettingsView};

pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

fn validate_user_id(user_id: &str) -> McpResult<&str> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        return Err(McpError::Validation("user_id must not be empty".into()));
    }
    Ok(trimmed)
}

pub(crate) fn parse_date_param(
    name: &str,
    raw: Option<&str>,
    default: NaiveDate,
) -> McpResult<NaiveDate> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => parse_date(s)
            .ok_or_else(|| McpError::Validation(format!("{name}: unrecognized date '{s}'"))),
        None => Ok(default),
    }
}

/// Goal, logging and analysis operations over a [`HydrationStore`].
///
/// Reads go through the retry policy; writes are attempted once since an
/// append is not idempotent.
#[derive(Clone)]
pub struct HydrationService {
    store: Arc<dyn HydrationStore>,
    config: Config,
    retry: RetryPolicy,
    clock: Clock,
}

impl HydrationService {
    pub fn new(store: Arc<dyn HydrationStore>, config: Config) -> Self {
        let retry = RetryPolicy::with_max_retries(config.retry_max);
        Self {
            store,
            config,
            retry,
            clock: Arc::new(|| Local::now().naive_local()),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn HydrationStore> {
        self.store.clone()
    }

    pub fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }

    fn view(&self, user_id: &str, settings: UserSettings) -> SettingsView {
        SettingsView {
            user_id: user_id.to_string(),
            profile: settings.profile,
            daily_goal_ml: settings
                .daily_goal_ml
                .unwrap_or(self.config.default_daily_goal_ml),
            goal_is_default: settings.daily_goal_ml.is_none(),
            streak: settings.streak,
        }
    }

    async fn load_settings(&self, user_id: &str) -> McpResult<UserSettings> {
        Ok(self
            .retry
            .retry_async("get_settings", || self.store.get_settings(user_id))
            .await?)
    }

    async fn load_days(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> McpResult<DayLog> {
        Ok(self
            .retry
            .retry_async("get_days", || self.store.get_days(user_id, start, end))
            .await?)
    }

    pub fn compute_goal(&self, profile: &UserProfile) -> McpResult<u32> {
        let result = compute_daily_goal(profile);
        record_goal_computed(result.is_ok());
        Ok(result?)
    }

    pub async fn complete_onboarding(
        &self,
        user_id: &str,
        profile: UserProfile,
    ) -> McpResult<SettingsView> {
        let user_id = validate_user_id(user_id)?;
        let goal = self.compute_goal(&profile)?;
        let settings = self.store.put_profile(user_id, profile, goal).await?;
        info!(user_id, daily_goal_ml = goal, "onboarding completed");
        Ok(self.view(user_id, settings))
    }

    pub async fn set_daily_goal(
        &self,
        user_id: &str,
        daily_goal_ml: u32,
    ) -> McpResult<SettingsView> {
        let user_id = validate_user_id(user_id)?;
        if daily_goal_ml == 0 {
            return Err(McpError::Validation(
                "daily_goal_ml must be positive".into(),
            ));
        }
        let settings = self.store.set_daily_goal(user_id, daily_goal_ml).await?;
        Ok(self.view(user_id, settings))
    }

    pub async fn settings(&self, user_id: &str) -> McpResult<SettingsView> {
        let user_id = validate_user_id(user_id)?;
        let settings = self.load_settings(user_id).await?;
        Ok(self.view(user_id, settings))
    }

    /// Append a drink and, when it lands on today's date, advance the streak.
    pub async fn log_drink(&self, user_id: &str, request: DrinkRequest) -> McpResult<LoggedDrink> {
        let user_id = validate_user_id(user_id)?;
        if request.amount_ml == 0 {
            return Err(McpError::Validation("amount_ml must be positive".into()));
        }
        let drink_type = request
            .drink_type
            .as_deref()
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_DRINK_TYPE.to_string());
        if catalog::drink_type(&drink_type).is_none() {
            return Err(McpError::Validation(format!(
                "unknown drink_type '{drink_type}'"
            )));
        }

        let now = self.now();
        let date = parse_date_param("date", request.date.as_deref(), now.date())?;
        let time = match request
            .time
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(s) => parse_clock_time(s).ok_or_else(|| {
                McpError::Validation(format!("time: unrecognized clock time '{s}'"))
            })?,
            None => now.time(),
        };

        // Read before the append: once the drink is stored the call must not fail.
        let settings = self.load_settings(user_id).await?;

        let record = self
            .store
            .append_drink(
                user_id,
                date,
                DrinkEvent {
                    amount_ml: request.amount_ml,
                    drink_type: drink_type.clone(),
                    time,
                },
            )
            .await?;
        record_drink_logged(&drink_type, request.amount_ml);

        let (streak, streak_transition) = if date == now.date() {
            match self.store.advance_streak(user_id, date).await {
                Ok((next, transition)) => (next, Some(transition)),
                Err(e) => {
                    warn!(user_id, %date, error = %e, "drink stored but streak not updated");
                    (settings.streak, None)
                }
            }
        } else {
            (settings.streak, None)
        };

        let daily_goal_ml = settings
            .daily_goal_ml
            .unwrap_or(self.config.default_daily_goal_ml);
        debug!(
            user_id,
            %date,
            amount_ml = request.amount_ml,
            total = %format_volume(record.total_amount_ml),
            "drink logged"
        );
        Ok(LoggedDrink {
            progress_percent: completion_percent(record.total_amount_ml, u64::from(daily_goal_ml)),
            record,
            daily_goal_ml,
            streak,
            streak_transition,
        })
    }

    pub async fn day_record(
        &self,
        user_id: &str,
        date: Option<&str>,
    ) -> McpResult<DayRecordResult> {
        let user_id = validate_user_id(user_id)?;
        let date = parse_date_param("date", date, self.today())?;
        let record = self
            .retry
            .retry_async("get_day", || self.store.get_day(user_id, date))
            .await?;
        Ok(DayRecordResult { date, record })
    }

    pub async fn series(
        &self,
        user_id: &str,
        granularity: &str,
        anchor: Option<&str>,
    ) -> McpResult<SeriesView> {
        let user_id = validate_user_id(user_id)?;
        let granularity: Granularity = granularity.parse()?;
        let anchor = parse_date_param("anchor", anchor, self.today())?;
        let (start, end) = window(granularity, anchor, self.config.week_start);
        let days = self.load_days(user_id, start, end).await?;
        Ok(aggregate(granularity, anchor, &days, self.config.week_start).into())
    }

    pub async fn summary(&self, user_id: &str, today: Option<&str>) -> McpResult<HydrationSummary> {
        let user_id = validate_user_id(user_id)?;
        let today = parse_date_param("today", today, self.today())?;
        let settings = self.load_settings(user_id).await?;
        let goal = settings
            .daily_goal_ml
            .unwrap_or(self.config.default_daily_goal_ml);
        let (start, end) = summary_window(today, self.config.week_start);
        let days = self.load_days(user_id, start, end).await?;
        Ok(summarize(&days, today, goal, self.config.week_start))
    }
}

type SubscriptionKey = (String, NaiveDate);

/// How long cancelled and closed subscriptions stay visible.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(15 * 60);

#[derive(Default)]
struct Registry {
    statuses: HashMap<String, SubscriptionStatus>,
    cancel_senders: HashMap<String, watch::Sender<bool>>,
    active: HashMap<SubscriptionKey, String>,
    finished: HashMap<String, Instant>,
}

impl Registry {
    /// Signal the task and move the status to `state`. False when the id is
    /// unknown or already stopped.
    fn stop(&mut self, subscription_id: &str, state: SubscriptionState) -> bool {
        let Some(tx) = self.cancel_senders.remove(subscription_id) else {
            return false;
        };
        let _ = tx.send(true);
        if let Some(status) = self.statuses.get_mut(subscription_id) {
            if status.state == SubscriptionState::Active {
                status.state = state;
            }
            let key = (status.user_id.clone(), status.date);
            if self.active.get(&key).map(String::as_str) == Some(subscription_id) {
                self.active.remove(&key);
            }
        }
        self.finished
            .insert(subscription_id.to_string(), Instant::now());
        true
    }

    fn prune(&mut self, retention: Duration) {
        let expired: Vec<String> = self
            .finished
            .iter()
            .filter(|(_, at)| at.elapsed() >= retention)
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            self.finished.remove(&id);
            self.statuses.remove(&id);
        }
    }
}

/// Live day-series subscriptions. At most one subscription is active per
/// `(user, date)`; subscribing again cancels the previous one. Stopped
/// subscriptions are dropped once the retention period has passed.
#[derive(Clone)]
pub struct SubscriptionService {
    registry: Arc<Mutex<Registry>>,
    retention: Duration,
}

impl Default for SubscriptionService {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionService {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            retention: DEFAULT_RETENTION,
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Start watching `date` for `user_id`. The store watch is registered
    /// before this returns, so every later write is observed.
    pub async fn subscribe(
        &self,
        store: Arc<dyn HydrationStore>,
        user_id: &str,
        date: NaiveDate,
    ) -> McpResult<String> {
        let user_id = validate_user_id(user_id)?.to_string();
        let mut updates_rx = store.watch_day(&user_id, date).await?;
        let id = Uuid::new_v4().to_string();
        let series = {
            let current = updates_rx.borrow_and_update();
            day_series(date, current.as_ref())
        };
        let (cancel_tx, mut cancel_rx) = watch::channel(false);

        // Replacement and registration share one critical section.
        {
            let mut registry = self.registry.lock().await;
            registry.prune(self.retention);
            if let Some(previous) = registry.active.insert((user_id.clone(), date), id.clone()) {
                debug!(subscription_id = %previous, "replacing subscription for same day");
                registry.stop(&previous, SubscriptionState::Cancelled);
            }
            registry.statuses.insert(
                id.clone(),
                SubscriptionStatus {
                    id: id.clone(),
                    user_id: user_id.clone(),
                    date,
                    state: SubscriptionState::Active,
                    updates: 0,
                    created_at: chrono::Utc::now().to_rfc3339(),
                    series,
                },
            );
            registry.cancel_senders.insert(id.clone(), cancel_tx);
        }

        let registry = self.registry.clone();
        let task_id = id.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    res = cancel_rx.changed() => {
                        if res.is_err() || *cancel_rx.borrow() {
                            break;
                        }
                    }
                    res = updates_rx.changed() => {
                        if res.is_err() {
                            registry.lock().await.stop(&task_id, SubscriptionState::Closed);
                            break;
                        }
                        let series = {
                            let current = updates_rx.borrow_and_update();
                            day_series(date, current.as_ref())
                        };
                        let mut registry = registry.lock().await;
                        if let Some(s) = registry.statuses.get_mut(&task_id)
                            && s.state == SubscriptionState::Active
                        {
                            s.series = series;
                            s.updates += 1;
                        }
                    }
                }
            }
            debug!(subscription_id = %task_id, "subscription task finished");
        });

        info!(subscription_id = %id, user_id, %date, "subscribed to day");
        Ok(id)
    }

    pub async fn get_status(&self, subscription_id: &str) -> Option<SubscriptionStatus> {
        self.registry
            .lock()
            .await
            .statuses
            .get(subscription_id)
            .cloned()
    }

    pub async fn list(&self) -> Vec<SubscriptionStatus> {
        let mut registry = self.registry.lock().await;
        registry.prune(self.retention);
        let mut all: Vec<_> = registry.statuses.values().cloned().collect();
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        all
    }

    /// Stop a subscription. Returns false when the id is unknown or already stopped.
    pub async fn cancel(&self, subscription_id: &str) -> bool {
        self.registry
            .lock()
            .await
            .stop(subscription_id, SubscriptionState::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FlakyStore, fixed_clock, seeded_store};
    use hydration_core::memory_store::InMemoryStore;
    use hydration_core::{ActivityLevel, Climate, PhysiologicalCategory, StreakTransition};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn service(store: Arc<dyn HydrationStore>) -> HydrationService {
        HydrationService::new(store, Config::default()).with_clock(fixed_clock(d(15), 10, 30))
    }

    fn drink(amount_ml: u32) -> DrinkRequest {
        DrinkRequest {
            amount_ml,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn onboarding_persists_computed_goal() {
        let svc = service(Arc::new(InMemoryStore::new()));
        let profile = UserProfile {
            weight_kg: 70.0,
            physiological_category: PhysiologicalCategory::Male,
            activity_level: ActivityLevel::Moderate,
            climate: Climate::Hot,
        };
        let view = svc.complete_onboarding("u1", profile).await.unwrap();
        assert_eq!(view.daily_goal_ml, 4600);
        assert!(!view.goal_is_default);
        assert_eq!(svc.settings("u1").await.unwrap().daily_goal_ml, 4600);
    }

    #[tokio::test]
    async fn settings_fall_back_to_default_goal() {
        let svc = service(Arc::new(InMemoryStore::new()));
        let view = svc.settings("fresh").await.unwrap();
        assert_eq!(view.daily_goal_ml, 2500);
        assert!(view.goal_is_default);
        assert!(svc.settings("  ").await.is_err());
    }

    #[tokio::test]
    async fn log_drink_defaults_to_now_and_advances_streak() {
        let svc = service(Arc::new(InMemoryStore::new()));
        let logged = svc.log_drink("u1", drink(500)).await.unwrap();
        assert_eq!(logged.record.date, d(15));
        assert_eq!(logged.record.events[0].drink_type, "water");
        assert_eq!(logged.progress_percent, 20);
        assert_eq!(logged.streak.count, 1);
        assert_eq!(logged.streak_transition, Some(StreakTransition::Reset));

        let again = svc.log_drink("u1", drink(250)).await.unwrap();
        assert_eq!(again.streak_transition, Some(StreakTransition::NoOp));
        assert_eq!(again.record.total_amount_ml, 750);
    }

    #[tokio::test]
    async fn backdated_drink_leaves_streak_alone() {
        let svc = service(Arc::new(InMemoryStore::new()));
        let logged = svc
            .log_drink(
                "u1",
                DrinkRequest {
                    amount_ml: 300,
                    drink_type: Some("Tea".into()),
                    date: Some("2025-03-10".into()),
                    time: Some("07:45".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(logged.record.date, d(10));
        assert_eq!(logged.streak_transition, None);
        assert_eq!(logged.streak.count, 0);
    }

    #[tokio::test]
    async fn log_drink_validates_input() {
        let svc = service(Arc::new(InMemoryStore::new()));
        assert!(matches!(
            svc.log_drink("u1", drink(0)).await,
            Err(McpError::Validation(_))
        ));
        let unknown = DrinkRequest {
            amount_ml: 100,
            drink_type: Some("lemonade".into()),
            ..Default::default()
        };
        assert!(matches!(
            svc.log_drink("u1", unknown).await,
            Err(McpError::Validation(_))
        ));
        let bad_date = DrinkRequest {
            amount_ml: 100,
            date: Some("15/03/2025".into()),
            ..Default::default()
        };
        assert!(svc.log_drink("u1", bad_date).await.is_err());
    }

    #[tokio::test]
    async fn series_and_summary_read_seeded_history() {
        let store = seeded_store(d(15)).await;
        let svc = service(store);
        let day = svc.series("u1", "day", None).await.unwrap();
        assert_eq!(day.values_ml.len(), 6);
        assert_eq!(day.total_ml, 2000);

        let month = svc.series("u1", "month", Some("2025-03-01")).await.unwrap();
        assert_eq!(month.values_ml.len(), 7);
        assert!(svc.series("u1", "fortnight", None).await.is_err());

        let summary = svc.summary("u1", None).await.unwrap();
        assert_eq!(summary.today, d(15));
        assert_eq!(summary.today_total_ml, 2000);
        assert_eq!(summary.today_progress_percent, 80);
    }

    #[tokio::test]
    async fn reads_retry_transient_store_errors() {
        let flaky = Arc::new(FlakyStore::new(2));
        let svc = service(flaky.clone()).with_retry(RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
        });
        let view = svc.settings("u1").await.unwrap();
        assert_eq!(view.daily_goal_ml, 2500);
        assert_eq!(flaky.failures_served(), 2);
    }

    #[tokio::test]
    async fn subscription_recomputes_on_write_and_replaces_same_key() {
        let store: Arc<dyn HydrationStore> = Arc::new(InMemoryStore::new());
        let subs = SubscriptionService::new();
        let first = subs.subscribe(store.clone(), "u1", d(15)).await.unwrap();

        let svc = service(store.clone());
        svc.log_drink("u1", drink(400)).await.unwrap();

        let status = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Some(s) = subs.get_status(&first).await
                    && s.updates > 0
                {
                    return s;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("update observed");
        assert_eq!(status.series.values_ml[2], 400);

        let second = subs.subscribe(store, "u1", d(15)).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(
            subs.get_status(&first).await.map(|s| s.state),
            Some(SubscriptionState::Cancelled)
        );
        let second_status = subs.get_status(&second).await.expect("second");
        assert_eq!(second_status.series.total_ml(), 400);

        assert!(subs.cancel(&second).await);
        assert!(!subs.cancel(&second).await);
        assert_eq!(subs.list().await.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_subscribes_leave_one_active() {
        let store: Arc<dyn HydrationStore> = Arc::new(InMemoryStore::new());
        let subs = SubscriptionService::new();
        for _ in 0..50 {
            let handles: Vec<_> = (0..16)
                .map(|_| {
                    let subs = subs.clone();
                    let store = store.clone();
                    tokio::spawn(async move { subs.subscribe(store, "u1", d(15)).await })
                })
                .collect();
            for handle in handles {
                handle.await.unwrap().unwrap();
            }
            let active: Vec<_> = subs
                .list()
                .await
                .into_iter()
                .filter(|s| s.state == SubscriptionState::Active)
                .collect();
            assert_eq!(active.len(), 1);
            assert!(subs.cancel(&active[0].id).await);
        }
    }

    #[tokio::test]
    async fn stopped_subscriptions_are_pruned_after_retention() {
        let store: Arc<dyn HydrationStore> = Arc::new(InMemoryStore::new());
        let subs = SubscriptionService::new().with_retention(Duration::ZERO);
        let id = subs.subscribe(store.clone(), "u1", d(15)).await.unwrap();
        assert!(subs.cancel(&id).await);
        assert_eq!(
            subs.get_status(&id).await.map(|s| s.state),
            Some(SubscriptionState::Cancelled)
        );
        assert!(subs.list().await.is_empty());
        assert!(subs.get_status(&id).await.is_none());

        let kept = SubscriptionService::new();
        let id = kept.subscribe(store, "u1", d(15)).await.unwrap();
        kept.cancel(&id).await;
        assert_eq!(kept.list().await.len(), 1);
    }

    #[tokio::test]
    async fn failed_settings_read_stores_nothing() {
        let flaky = Arc::new(FlakyStore::new(10));
        let svc = service(flaky.clone()).with_retry(RetryPolicy {
            max_retries: 0,
            base_delay: Duration::from_millis(1),
        });
        assert!(svc.log_drink("u1", drink(300)).await.is_err());
        assert_eq!(flaky.get_day("u1", d(15)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn streak_failure_after_append_still_reports_the_drink() {
        let flaky = Arc::new(FlakyStore::new(0).failing_streak());
        let svc = service(flaky.clone());
        let logged = svc.log_drink("u1", drink(300)).await.unwrap();
        assert_eq!(logged.record.total_amount_ml, 300);
        assert_eq!(logged.streak_transition, None);
        assert_eq!(logged.streak.count, 0);
        let stored = flaky.get_day("u1", d(15)).await.unwrap().unwrap();
        assert_eq!(stored.total_amount_ml, 300);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_logs_advance_streak_once() {
        let store: Arc<dyn HydrationStore> = Arc::new(InMemoryStore::new());
        store.advance_streak("u1", d(14)).await.unwrap();
        let svc = service(store.clone());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.log_drink("u1", drink(100)).await })
            })
            .collect();
        let mut increments = 0;
        for handle in handles {
            let logged = handle.await.unwrap().unwrap();
            if logged.streak_transition == Some(StreakTransition::Increment) {
                increments += 1;
            }
        }
        assert_eq!(increments, 1);
        let settings = store.get_settings("u1").await.unwrap();
        assert_eq!(settings.streak.count, 2);
        assert_eq!(settings.streak.last_active_date, Some(d(15)));
    }

    #[tokio::test]
    async fn calendar_limit_dates_do_not_panic() {
        let svc = service(Arc::new(InMemoryStore::new()));
        let max = NaiveDate::MAX.format("%Y-%m-%d").to_string();
        let min = NaiveDate::MIN.format("%Y-%m-%d").to_string();
        for anchor in [&max, &min] {
            if let Ok(week) = svc.series("u1", "week", Some(anchor)).await {
                assert_eq!(week.values_ml, vec![0; 7]);
            }
            if let Ok(summary) = svc.summary("u1", Some(anchor)).await {
                assert_eq!(summary.today_total_ml, 0);
            }
        }
        let week = svc
            .series("u1", "week", Some("+262142-12-31"))
            .await
            .unwrap();
        assert_eq!(week.total_ml, 0);
    }
}
