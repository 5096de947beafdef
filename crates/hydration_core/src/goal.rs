//! Daily hydration goal calculation.
//!
//! `weight_kg * 33` ml, scaled once by each of the physiological, activity
//! and climate multipliers, then rounded to the nearest 50 ml.

use crate::{ActivityLevel, Climate, HydrationError, PhysiologicalCategory, UserProfile};

pub const ML_PER_KG: f64 = 33.0;
pub const ROUNDING_STEP_ML: f64 = 50.0;

/// Fallback goal used when a user has not completed onboarding.
pub const DEFAULT_DAILY_GOAL_ML: u32 = 2500;

pub const CATEGORY_MULTIPLIERS: [(PhysiologicalCategory, f64); 5] = [
    (PhysiologicalCategory::Male, 1.1),
    (PhysiologicalCategory::Female, 1.0),
    (PhysiologicalCategory::Pregnant, 1.1),
    (PhysiologicalCategory::Nursing, 1.2),
    (PhysiologicalCategory::Other, 1.0),
];

pub const ACTIVITY_MULTIPLIERS: [(ActivityLevel, f64); 4] = [
    (ActivityLevel::Sedentary, 1.0),
    (ActivityLevel::Light, 1.2),
    (ActivityLevel::Moderate, 1.4),
    (ActivityLevel::VeryActive, 1.6),
];

pub const CLIMATE_MULTIPLIERS: [(Climate, f64); 3] = [
    (Climate::Cold, 0.9),
    (Climate::Moderate, 1.0),
    (Climate::Hot, 1.3),
];

fn lookup<K: PartialEq + std::fmt::Debug>(
    table: &[(K, f64)],
    key: &K,
    field: &str,
) -> Result<f64, HydrationError> {
    table
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, m)| *m)
        .ok_or_else(|| HydrationError::InvalidInput(format!("unrecognized {field}: {key:?}")))
}

/// Compute the daily goal in milliliters.
///
/// Fails with [`HydrationError::InvalidInput`] for a non-positive or
/// non-finite weight, or when any enum field is `Unknown`.
pub fn compute_daily_goal(profile: &UserProfile) -> Result<u32, HydrationError> {
    if !profile.weight_kg.is_finite() || profile.weight_kg <= 0.0 {
        return Err(HydrationError::InvalidInput(format!(
            "weight must be positive, got {}",
            profile.weight_kg
        )));
    }

    let category = lookup(
        &CATEGORY_MULTIPLIERS,
        &profile.physiological_category,
        "physiological category",
    )?;
    let activity = lookup(&ACTIVITY_MULTIPLIERS, &profile.activity_level, "activity level")?;
    let climate = lookup(&CLIMATE_MULTIPLIERS, &profile.climate, "climate")?;

    let ml = profile.weight_kg * ML_PER_KG * category * activity * climate;
    let rounded = (ml / ROUNDING_STEP_ML).round() * ROUNDING_STEP_ML;
    if rounded > f64::from(u32::MAX) {
        return Err(HydrationError::InvalidInput(format!(
            "weight {} kg is out of range",
            profile.weight_kg
        )));
    }

    // Tiny weights round to zero; the goal is never below one step.
    Ok((rounded as u32).max(ROUNDING_STEP_ML as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(
        weight_kg: f64,
        physiological_category: PhysiologicalCategory,
        activity_level: ActivityLevel,
        climate: Climate,
    ) -> UserProfile {
        UserProfile {
            weight_kg,
            physiological_category,
            activity_level,
            climate,
        }
    }

    #[test]
    fn male_moderate_hot() {
        let p = profile(
            70.0,
            PhysiologicalCategory::Male,
            ActivityLevel::Moderate,
            Climate::Hot,
        );
        assert_eq!(compute_daily_goal(&p).unwrap(), 4600);
    }

    #[test]
    fn female_sedentary_moderate() {
        let p = profile(
            60.0,
            PhysiologicalCategory::Female,
            ActivityLevel::Sedentary,
            Climate::Moderate,
        );
        assert_eq!(compute_daily_goal(&p).unwrap(), 2000);
    }

    #[test]
    fn climate_is_applied_once() {
        // 80 * 33 = 2640; * 1.0 * 1.0 * 0.9 = 2376 -> 2400
        let p = profile(
            80.0,
            PhysiologicalCategory::Other,
            ActivityLevel::Sedentary,
            Climate::Cold,
        );
        assert_eq!(compute_daily_goal(&p).unwrap(), 2400);
    }

    #[test]
    fn rejects_non_positive_weight() {
        for w in [0.0, -5.0, f64::NAN] {
            let p = profile(
                w,
                PhysiologicalCategory::Male,
                ActivityLevel::Light,
                Climate::Moderate,
            );
            assert!(matches!(
                compute_daily_goal(&p),
                Err(HydrationError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn rejects_unknown_enums() {
        let p = profile(
            70.0,
            PhysiologicalCategory::Unknown,
            ActivityLevel::Light,
            Climate::Moderate,
        );
        assert!(compute_daily_goal(&p).is_err());
        let p = profile(
            70.0,
            PhysiologicalCategory::Male,
            ActivityLevel::Unknown,
            Climate::Moderate,
        );
        assert!(compute_daily_goal(&p).is_err());
        let p = profile(
            70.0,
            PhysiologicalCategory::Male,
            ActivityLevel::Light,
            Climate::Unknown,
        );
        assert!(compute_daily_goal(&p).is_err());
    }

    #[test]
    fn tiny_weight_still_positive() {
        let p = profile(
            0.2,
            PhysiologicalCategory::Female,
            ActivityLevel::Sedentary,
            Climate::Cold,
        );
        assert_eq!(compute_daily_goal(&p).unwrap(), 50);
    }
}
