//! Metric names and recording helpers.
//!
//! Recording is a no-op until a recorder is installed (the HTTP server
//! installs a Prometheus one).

use std::time::Duration;

pub const STORE_OPERATIONS_TOTAL: &str = "hydration_store_operations_total";
pub const STORE_OPERATION_SECONDS: &str = "hydration_store_operation_seconds";
pub const DRINKS_LOGGED_TOTAL: &str = "hydration_drinks_logged_total";
pub const DRINK_VOLUME_ML_TOTAL: &str = "hydration_drink_volume_ml_total";
pub const GOALS_COMPUTED_TOTAL: &str = "hydration_goals_computed_total";
pub const STORE_RETRIES_TOTAL: &str = "hydration_store_retries_total";

pub fn record_store_operation(operation: &'static str, elapsed: Duration, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    metrics::counter!(STORE_OPERATIONS_TOTAL, "operation" => operation, "outcome" => outcome)
        .increment(1);
    metrics::histogram!(STORE_OPERATION_SECONDS, "operation" => operation)
        .record(elapsed.as_secs_f64());
}

pub fn record_drink_logged(drink_type: &str, amount_ml: u32) {
    metrics::counter!(DRINKS_LOGGED_TOTAL, "drink_type" => drink_type.to_string()).increment(1);
    metrics::counter!(DRINK_VOLUME_ML_TOTAL).increment(u64::from(amount_ml));
}

pub fn record_goal_computed(ok: bool) {
    let outcome = if ok { "ok" } else { "invalid" };
    metrics::counter!(GOALS_COMPUTED_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_store_retry(operation: &str) {
    metrics::counter!(STORE_RETRIES_TOTAL, "operation" => operation.to_string()).increment(1);
}
