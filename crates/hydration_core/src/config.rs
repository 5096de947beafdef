use std::path::PathBuf;

use crate::HydrationError;
use crate::aggregate::WeekStart;
use crate::goal::DEFAULT_DAILY_GOAL_ML;

#[derive(Clone, Debug)]
pub struct Config {
    /// Goal used for users that never completed onboarding
    pub default_daily_goal_ml: u32,
    pub week_start: WeekStart,
    /// Optional JSON export used to seed the in-memory store
    pub data_file: Option<PathBuf>,
    pub retry_max: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_daily_goal_ml: DEFAULT_DAILY_GOAL_ML,
            week_start: WeekStart::Monday,
            data_file: None,
            retry_max: 3,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, HydrationError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function instead of the process environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, HydrationError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let default_daily_goal_ml = match get("HYDRATION_DEFAULT_GOAL_ML") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(v) if v > 0 => v,
                _ => {
                    return Err(HydrationError::Config(format!(
                        "HYDRATION_DEFAULT_GOAL_ML must be a positive integer, got {raw}"
                    )));
                }
            },
            None => defaults.default_daily_goal_ml,
        };

        let week_start = match get("HYDRATION_WEEK_START") {
            Some(raw) => raw.parse::<WeekStart>()?,
            None => defaults.week_start,
        };

        let retry_max = match get("HYDRATION_RETRY_MAX") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                HydrationError::Config(format!("HYDRATION_RETRY_MAX must be an integer, got {raw}"))
            })?,
            None => defaults.retry_max,
        };

        let data_file = get("HYDRATION_DATA_FILE")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            default_daily_goal_ml,
            week_start,
            data_file,
            retry_max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_uses_defaults() {
        let cfg = Config::from_env_with(|_| None).expect("cfg");
        assert_eq!(cfg.default_daily_goal_ml, 2500);
        assert_eq!(cfg.week_start, WeekStart::Monday);
        assert!(cfg.data_file.is_none());
        assert_eq!(cfg.retry_max, 3);
    }

    #[test]
    fn from_env_reads_values() {
        let get = |k: &str| match k {
            "HYDRATION_DEFAULT_GOAL_ML" => Some("2000".into()),
            "HYDRATION_WEEK_START" => Some("Sunday".into()),
            "HYDRATION_DATA_FILE" => Some("/tmp/export.json".into()),
            "HYDRATION_RETRY_MAX" => Some("0".into()),
            _ => None,
        };
        let cfg = Config::from_env_with(get).expect("cfg");
        assert_eq!(cfg.default_daily_goal_ml, 2000);
        assert_eq!(cfg.week_start, WeekStart::Sunday);
        assert_eq!(cfg.data_file, Some(PathBuf::from("/tmp/export.json")));
        assert_eq!(cfg.retry_max, 0);
    }

    #[test]
    fn from_env_rejects_zero_goal() {
        let get = |k: &str| match k {
            "HYDRATION_DEFAULT_GOAL_ML" => Some("0".into()),
            _ => None,
        };
        assert!(Config::from_env_with(get).is_err());
    }

    #[test]
    fn from_env_rejects_unknown_week_start() {
        let get = |k: &str| match k {
            "HYDRATION_WEEK_START" => Some("wednesday".into()),
            _ => None,
        };
        assert!(matches!(
            Config::from_env_with(get),
            Err(HydrationError::Config(_))
        ));
    }
}
