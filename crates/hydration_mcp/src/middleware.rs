//! Logging and metrics around any [`HydrationStore`].

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use hydration_core::observability::record_store_operation;
use hydration_core::{
    DayLog, DayRecord, DrinkEvent, HydrationError, HydrationStore, StreakState, StreakTransition,
    UserProfile, UserSettings,
};
use tokio::sync::watch;
use tracing::debug;

/// Wraps a store so that every call is timed, logged at debug level and
/// counted in the store operation metrics.
#[derive(Clone)]
pub struct LoggingMiddleware<S: HydrationStore> {
    inner: Arc<S>,
}

impl<S: HydrationStore> LoggingMiddleware<S> {
    pub fn new(store: S) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    async fn with_logging<F, Fut, T>(
        &self,
        operation: F,
        name: &'static str,
        user_id: &str,
    ) -> Result<T, HydrationError>
    where
        F: FnOnce(Arc<S>) -> Fut,
        Fut: std::future::Future<Output = Result<T, HydrationError>>,
    {
        let start = Instant::now();
        debug!(operation = name, user_id, "store call");

        let result = operation(self.inner.clone()).await;

        let duration = start.elapsed();
        match &result {
            Ok(_) => debug!(operation = name, user_id, ?duration, "store call ok"),
            Err(e) => debug!(operation = name, user_id, ?duration, error = %e, "store call failed"),
        }
        record_store_operation(name, duration, result.is_ok());

        result
    }
}

#[async_trait::async_trait]
impl<S: HydrationStore> HydrationStore for LoggingMiddleware<S> {
    async fn get_settings(&self, user_id: &str) -> Result<UserSettings, HydrationError> {
        self.with_logging(
            |store| async move { store.get_settings(user_id).await },
            "get_settings",
            user_id,
        )
        .await
    }

    async fn put_profile(
        &self,
        user_id: &str,
        profile: UserProfile,
        daily_goal_ml: u32,
    ) -> Result<UserSettings, HydrationError> {
        self.with_logging(
            |store| async move { store.put_profile(user_id, profile, daily_goal_ml).await },
            "put_profile",
            user_id,
        )
        .await
    }

    async fn set_daily_goal(
        &self,
        user_id: &str,
        daily_goal_ml: u32,
    ) -> Result<UserSettings, HydrationError> {
        self.with_logging(
            |store| async move { store.set_daily_goal(user_id, daily_goal_ml).await },
            "set_daily_goal",
            user_id,
        )
        .await
    }

    async fn advance_streak(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<(StreakState, StreakTransition), HydrationError> {
        self.with_logging(
            |store| async move { store.advance_streak(user_id, today).await },
            "advance_streak",
            user_id,
        )
        .await
    }

    async fn get_day(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DayRecord>, HydrationError> {
        self.with_logging(
            |store| async move { store.get_day(user_id, date).await },
            "get_day",
            user_id,
        )
        .await
    }

    async fn get_days(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DayLog, HydrationError> {
        self.with_logging(
            |store| async move { store.get_days(user_id, start, end).await },
            "get_days",
            user_id,
        )
        .await
    }

    async fn append_drink(
        &self,
        user_id: &str,
        date: NaiveDate,
        event: DrinkEvent,
    ) -> Result<DayRecord, HydrationError> {
        self.with_logging(
            |store| async move { store.append_drink(user_id, date, event).await },
            "append_drink",
            user_id,
        )
        .await
    }

    async fn watch_day(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<watch::Receiver<Option<DayRecord>>, HydrationError> {
        self.with_logging(
            |store| async move { store.watch_day(user_id, date).await },
            "watch_day",
            user_id,
        )
        .await
    }
}
