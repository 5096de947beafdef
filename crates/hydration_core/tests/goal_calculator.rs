use hydration_core::goal::ROUNDING_STEP_ML;
use hydration_core::{
    ActivityLevel, Climate, HydrationError, PhysiologicalCategory, UserProfile, compute_daily_goal,
};

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
fn every_combination_is_a_positive_multiple_of_step() {
    for weight in [40.0, 55.5, 70.0, 92.3, 150.0] {
        for category in PhysiologicalCategory::ALL {
            for activity in ActivityLevel::ALL {
                for climate in Climate::ALL {
                    let goal = compute_daily_goal(&profile(weight, category, activity, climate))
                        .expect("valid profile");
                    assert!(goal > 0, "{weight} {category:?} {activity:?} {climate:?}");
                    assert_eq!(goal % ROUNDING_STEP_ML as u32, 0);
                }
            }
        }
    }
}

#[test]
fn reference_profiles() {
    let hot_male = profile(
        70.0,
        PhysiologicalCategory::Male,
        ActivityLevel::Moderate,
        Climate::Hot,
    );
    assert_eq!(compute_daily_goal(&hot_male).unwrap(), 4600);

    let sedentary_female = profile(
        60.0,
        PhysiologicalCategory::Female,
        ActivityLevel::Sedentary,
        Climate::Moderate,
    );
    assert_eq!(compute_daily_goal(&sedentary_female).unwrap(), 2000);
}

#[test]
fn goal_grows_with_weight() {
    let goal = |w| {
        compute_daily_goal(&profile(
            w,
            PhysiologicalCategory::Other,
            ActivityLevel::Light,
            Climate::Moderate,
        ))
        .unwrap()
    };
    assert!(goal(50.0) <= goal(60.0));
    assert!(goal(60.0) <= goal(90.0));
}

#[test]
fn rejects_unusable_input() {
    for weight in [0.0, -5.0, f64::NAN, f64::INFINITY] {
        let res = compute_daily_goal(&profile(
            weight,
            PhysiologicalCategory::Male,
            ActivityLevel::Light,
            Climate::Cold,
        ));
        assert!(matches!(res, Err(HydrationError::InvalidInput(_))), "{weight}");
    }

    let res = compute_daily_goal(&profile(
        70.0,
        PhysiologicalCategory::Male,
        ActivityLevel::Unknown,
        Climate::Cold,
    ));
    assert!(matches!(res, Err(HydrationError::InvalidInput(_))));
}
