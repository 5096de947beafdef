//! REST surface over [`HydrationService`], shared by the `server` binary and tests.

use std::sync::Arc;

use axum::debug_handler;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use hydration_core::insights::HydrationSummary;
use hydration_core::{HydrationError, UserProfile};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;

use crate::error::McpError;
use crate::services::HydrationService;
use crate::transforms::{SeriesView, ml_to_liters};
use crate::types::{DrinkRequest, GoalResult, LoggedDrink, SettingsView};

pub struct AppState {
    pub service: HydrationService,
    /// Absent when no recorder is installed (tests).
    pub metrics: Option<PrometheusHandle>,
}

#[derive(Debug, Deserialize)]
pub struct GoalBody {
    pub daily_goal_ml: u32,
}

#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    pub granularity: String,
    pub anchor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub today: Option<String>,
}

#[debug_handler]
async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[debug_handler]
async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::NOT_FOUND,
            [("content-type", "text/plain")],
            "metrics recorder not installed".to_string(),
        ),
    }
}

#[debug_handler]
async fn compute_goal(
    State(state): State<Arc<AppState>>,
    Json(profile): Json<UserProfile>,
) -> Result<Json<GoalResult>, (StatusCode, String)> {
    let goal = state.service.compute_goal(&profile).map_err(map_err)?;
    Ok(Json(GoalResult {
        daily_goal_ml: goal,
        daily_goal_l: ml_to_liters(u64::from(goal)),
    }))
}

#[debug_handler]
async fn get_settings(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<SettingsView>, (StatusCode, String)> {
    state
        .service
        .settings(&user_id)
        .await
        .map(Json)
        .map_err(map_err)
}

#[debug_handler]
async fn complete_onboarding(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(profile): Json<UserProfile>,
) -> Result<Json<SettingsView>, (StatusCode, String)> {
    state
        .service
        .complete_onboarding(&user_id, profile)
        .await
        .map(Json)
        .map_err(map_err)
}

#[debug_handler]
async fn set_goal(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(body): Json<GoalBody>,
) -> Result<Json<SettingsView>, (StatusCode, String)> {
    state
        .service
        .set_daily_goal(&user_id, body.daily_goal_ml)
        .await
        .map(Json)
        .map_err(map_err)
}

#[debug_handler]
async fn log_drink(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(drink): Json<DrinkRequest>,
) -> Result<(StatusCode, Json<LoggedDrink>), (StatusCode, String)> {
    let logged = state
        .service
        .log_drink(&user_id, drink)
        .await
        .map_err(map_err)?;
    Ok((StatusCode::CREATED, Json(logged)))
}

#[debug_handler]
async fn get_series(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(q): Query<SeriesQuery>,
) -> Result<Json<SeriesView>, (StatusCode, String)> {
    state
        .service
        .series(&user_id, &q.granularity, q.anchor.as_deref())
        .await
        .map(Json)
        .map_err(map_err)
}

#[debug_handler]
async fn get_summary(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(q): Query<SummaryQuery>,
) -> Result<Json<HydrationSummary>, (StatusCode, String)> {
    state
        .service
        .summary(&user_id, q.today.as_deref())
        .await
        .map(Json)
        .map_err(map_err)
}

pub fn map_err(e: McpError) -> (StatusCode, String) {
    let status = match &e {
        McpError::Validation(_) | McpError::Hydration(HydrationError::InvalidInput(_)) => {
            StatusCode::BAD_REQUEST
        }
        McpError::NotFound(_) | McpError::Hydration(HydrationError::NotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        McpError::Hydration(HydrationError::Store(_)) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if !e.is_client_error() {
        tracing::error!(error = %e, %status, "request failed");
    }
    (status, e.to_string())
}

/// All REST routes. The caller adds transport-level layers.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/goal", post(compute_goal))
        .route("/users/{id}/settings", get(get_settings))
        .route("/users/{id}/onboarding", post(complete_onboarding))
        .route("/users/{id}/goal", put(set_goal))
        .route("/users/{id}/drinks", post(log_drink))
        .route("/users/{id}/series", get(get_series))
        .route("/users/{id}/summary", get(get_summary))
        .with_state(state)
}
