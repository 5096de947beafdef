//! Shared test utilities: a seeded in-memory store, a store that fails on
//! demand and a frozen clock.
#![cfg(test)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveTime};
use tokio::sync::watch;

use hydration_core::memory_store::InMemoryStore;
use hydration_core::{
    DayLog, DayRecord, DrinkEvent, HydrationError, HydrationStore, StreakState, StreakTransition,
    UserProfile, UserSettings,
};

use crate::services::Clock;

pub fn fixed_clock(date: NaiveDate, hour: u32, minute: u32) -> Clock {
    let now = date.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap());
    Arc::new(move || now)
}

fn drink(amount_ml: u32, hour: u32) -> DrinkEvent {
    DrinkEvent {
        amount_ml,
        drink_type: "water".into(),
        time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
    }
}

/// Store for user `u1` with 1500 ml on each of the 40 days before `today`
/// and 2000 ml on `today` (1200 in the morning, 800 in the evening).
pub async fn seeded_store(today: NaiveDate) -> Arc<dyn HydrationStore> {
    let store = InMemoryStore::new();
    for offset in 1..=40 {
        let date = today - Duration::days(offset);
        let mut rec = DayRecord::empty(date);
        rec.append(drink(1000, 9));
        rec.append(drink(500, 14));
        store.insert_day("u1", rec).await;
    }
    let mut rec = DayRecord::empty(today);
    rec.append(drink(1200, 8));
    rec.append(drink(800, 19));
    store.insert_day("u1", rec).await;
    Arc::new(store)
}

/// Delegates to an [`InMemoryStore`], failing the first `failures` reads of
/// settings with a retryable store error, and every streak write when
/// [`FlakyStore::failing_streak`] is set.
pub struct FlakyStore {
    inner: InMemoryStore,
    remaining: AtomicU32,
    served: AtomicU32,
    fail_streak: AtomicBool,
}

impl FlakyStore {
    pub fn new(failures: u32) -> Self {
        Self {
            inner: InMemoryStore::new(),
            remaining: AtomicU32::new(failures),
            served: AtomicU32::new(0),
            fail_streak: AtomicBool::new(false),
        }
    }

    pub fn failing_streak(self) -> Self {
        self.fail_streak.store(true, Ordering::SeqCst);
        self
    }

    pub fn failures_served(&self) -> u32 {
        self.served.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HydrationStore for FlakyStore {
    async fn get_settings(&self, user_id: &str) -> Result<UserSettings, HydrationError> {
        let left = self.remaining.load(Ordering::SeqCst);
        if left > 0 {
            self.remaining.store(left - 1, Ordering::SeqCst);
            self.served.fetch_add(1, Ordering::SeqCst);
            return Err(HydrationError::Store("temporarily unavailable".into()));
        }
        self.inner.get_settings(user_id).await
    }

    async fn put_profile(
        &self,
        user_id: &str,
        profile: UserProfile,
        daily_goal_ml: u32,
    ) -> Result<UserSettings, HydrationError> {
        self.inner
            .put_profile(user_id, profile, daily_goal_ml)
            .await
    }

    async fn set_daily_goal(
        &self,
        user_id: &str,
        daily_goal_ml: u32,
    ) -> Result<UserSettings, HydrationError> {
        self.inner.set_daily_goal(user_id, daily_goal_ml).await
    }

    async fn advance_streak(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<(StreakState, StreakTransition), HydrationError> {
        if self.fail_streak.load(Ordering::SeqCst) {
            return Err(HydrationError::Store("streak write rejected".into()));
        }
        self.inner.advance_streak(user_id, today).await
    }

    async fn get_day(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DayRecord>, HydrationError> {
        self.inner.get_day(user_id, date).await
    }

    async fn get_days(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DayLog, HydrationError> {
        self.inner.get_days(user_id, start, end).await
    }

    async fn append_drink(
        &self,
        user_id: &str,
        date: NaiveDate,
        event: DrinkEvent,
    ) -> Result<DayRecord, HydrationError> {
        self.inner.append_drink(user_id, date, event).await
    }

    async fn watch_day(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<watch::Receiver<Option<DayRecord>>, HydrationError> {
        self.inner.watch_day(user_id, date).await
    }
}
