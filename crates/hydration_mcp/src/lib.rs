use std::sync::Arc;

use rmcp::Json;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    AnnotateAble, GetPromptRequestParams, GetPromptResult, ListPromptsResult, ListResourcesResult,
    PaginatedRequestParams, RawResource, ReadResourceRequestParams, ReadResourceResult,
    ResourceContents,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData, RoleServer};
use rmcp::{prompt, prompt_handler, prompt_router, tool, tool_handler, tool_router};

use hydration_core::catalog::DRINK_TYPES;
use hydration_core::config::Config;
use hydration_core::insights::HydrationSummary;
use hydration_core::memory_store::InMemoryStore;
use hydration_core::{HydrationError, HydrationStore, UserProfile};

pub mod error;
pub mod http;
pub mod middleware;
mod prompts;
pub mod services;
pub mod state;
mod test_utils;
pub mod transforms;
pub mod types;

pub use error::{McpError, McpResult};
pub use middleware::LoggingMiddleware;
use services::parse_date_param;
pub use services::{HydrationService, SubscriptionService};
pub use state::{SubscriptionState, SubscriptionStatus};
pub use transforms::SeriesView;
pub use types::*;

pub const DRINK_TYPES_URI: &str = "hydration://catalog/drink-types";

/// Log filter from `HYDRATION_LOG_LEVEL`, falling back to `RUST_LOG`, then `info`.
pub fn resolve_log_filter<F>(mut get: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut non_blank = |key: &str| get(key).filter(|s| !s.trim().is_empty());
    non_blank("HYDRATION_LOG_LEVEL")
        .or_else(|| non_blank("RUST_LOG"))
        .unwrap_or_else(|| "info".to_string())
}

/// Build the store described by `config`: seeded from the export file when
/// one is configured, empty otherwise, wrapped in logging middleware.
pub async fn build_store(config: &Config) -> Result<Arc<dyn HydrationStore>, HydrationError> {
    let store = match &config.data_file {
        Some(path) => InMemoryStore::load_export_file(path).await?,
        None => InMemoryStore::new(),
    };
    tracing::info!(users = store.user_count().await, "hydration store ready");
    Ok(Arc::new(LoggingMiddleware::new(store)))
}

#[derive(Clone)]
pub struct HydrationMcpHandler {
    service: HydrationService,
    subscriptions: SubscriptionService,
    tool_router: rmcp::handler::server::tool::ToolRouter<HydrationMcpHandler>,
    prompt_router: rmcp::handler::server::router::prompt::PromptRouter<HydrationMcpHandler>,
}

#[tool_router]
#[prompt_router]
impl HydrationMcpHandler {
    pub fn new(store: Arc<dyn HydrationStore>, config: Config) -> Self {
        Self::from_service(HydrationService::new(store, config))
    }

    pub fn from_service(service: HydrationService) -> Self {
        Self {
            service,
            subscriptions: SubscriptionService::new(),
            tool_router: Self::tool_router(),
            prompt_router: Self::prompt_router(),
        }
    }

    pub fn service(&self) -> &HydrationService {
        &self.service
    }

    pub fn tool_count(&self) -> usize {
        self.tool_router.list_all().len()
    }

    pub fn prompt_count(&self) -> usize {
        self.prompt_router.list_all().len()
    }

    #[tool(
        name = "compute_daily_goal",
        description = "Compute a daily water goal (ml, multiple of 50) from weight, physiological category, activity level and climate"
    )]
    async fn compute_daily_goal(
        &self,
        params: Parameters<UserProfile>,
    ) -> Result<Json<GoalResult>, String> {
        let goal = self.service.compute_goal(&params.0)?;
        Ok(Json(GoalResult {
            daily_goal_ml: goal,
            daily_goal_l: transforms::ml_to_liters(u64::from(goal)),
        }))
    }

    #[tool(
        name = "complete_onboarding",
        description = "Store a user's profile and the daily goal computed from it"
    )]
    async fn complete_onboarding(
        &self,
        params: Parameters<OnboardingParams>,
    ) -> Result<Json<SettingsView>, String> {
        let p = params.0;
        let view = self
            .service
            .complete_onboarding(&p.user_id, p.profile)
            .await?;
        Ok(Json(view))
    }

    #[tool(
        name = "set_daily_goal",
        description = "Override a user's daily goal in milliliters"
    )]
    async fn set_daily_goal(
        &self,
        params: Parameters<SetGoalParams>,
    ) -> Result<Json<SettingsView>, String> {
        let p = params.0;
        Ok(Json(
            self.service
                .set_daily_goal(&p.user_id, p.daily_goal_ml)
                .await?,
        ))
    }

    #[tool(
        name = "get_user_settings",
        description = "Get a user's profile, effective daily goal and streak"
    )]
    async fn get_user_settings(
        &self,
        params: Parameters<UserIdParam>,
    ) -> Result<Json<SettingsView>, String> {
        Ok(Json(self.service.settings(&params.0.user_id).await?))
    }

    #[tool(
        name = "log_drink",
        description = "Log a drink for a user. Date and time default to now; logging for today advances the streak"
    )]
    async fn log_drink(
        &self,
        params: Parameters<LogDrinkParams>,
    ) -> Result<Json<LoggedDrink>, String> {
        let p = params.0;
        Ok(Json(self.service.log_drink(&p.user_id, p.drink).await?))
    }

    #[tool(
        name = "get_day_record",
        description = "Get the raw record (total, last drink time, drinks) for one date"
    )]
    async fn get_day_record(
        &self,
        params: Parameters<DayParams>,
    ) -> Result<Json<DayRecordResult>, String> {
        let p = params.0;
        Ok(Json(
            self.service
                .day_record(&p.user_id, p.date.as_deref())
                .await?,
        ))
    }

    #[tool(
        name = "get_intake_series",
        description = "Aggregate intake into day (6x4h), week (7 days), month (5-day runs) or year (12 months) buckets"
    )]
    async fn get_intake_series(
        &self,
        params: Parameters<SeriesParams>,
    ) -> Result<Json<SeriesView>, String> {
        let p = params.0;
        Ok(Json(
            self.service
                .series(&p.user_id, &p.granularity, p.anchor.as_deref())
                .await?,
        ))
    }

    #[tool(
        name = "get_hydration_summary",
        description = "Daily average, weekly total, monthly goal completion and best/worst time of day, each compared with the previous period"
    )]
    async fn get_hydration_summary(
        &self,
        params: Parameters<SummaryParams>,
    ) -> Result<Json<HydrationSummary>, String> {
        let p = params.0;
        Ok(Json(
            self.service.summary(&p.user_id, p.today.as_deref()).await?,
        ))
    }

    #[tool(name = "list_drink_types", description = "List the drink catalog")]
    async fn list_drink_types(&self) -> Result<Json<DrinkTypesResult>, String> {
        Ok(Json(DrinkTypesResult {
            drink_types: DRINK_TYPES.to_vec(),
        }))
    }

    #[tool(
        name = "subscribe_day",
        description = "Keep a day series for a user and date up to date as drinks are logged; replaces any existing subscription for the same day"
    )]
    async fn subscribe_day(
        &self,
        params: Parameters<DayParams>,
    ) -> Result<Json<SubscriptionStartResult>, String> {
        let p = params.0;
        let date = parse_date_param("date", p.date.as_deref(), self.service.today())?;
        let id = self
            .subscriptions
            .subscribe(self.service.store(), &p.user_id, date)
            .await?;
        Ok(Json(SubscriptionStartResult {
            subscription_id: id,
        }))
    }

    #[tool(
        name = "get_subscription",
        description = "Get the state and latest series of a day subscription"
    )]
    async fn get_subscription(
        &self,
        params: Parameters<SubscriptionIdParam>,
    ) -> Result<Json<SubscriptionStatusResult>, String> {
        let id = params.0.subscription_id;
        let status = self
            .subscriptions
            .get_status(&id)
            .await
            .ok_or_else(|| McpError::NotFound(format!("subscription {id}")))?;
        Ok(Json(SubscriptionStatusResult { status }))
    }

    #[tool(name = "unsubscribe_day", description = "Cancel a day subscription")]
    async fn unsubscribe_day(
        &self,
        params: Parameters<SubscriptionIdParam>,
    ) -> Result<Json<UnsubscribeResult>, String> {
        let cancelled = self.subscriptions.cancel(&params.0.subscription_id).await;
        Ok(Json(UnsubscribeResult { cancelled }))
    }

    #[tool(name = "list_subscriptions", description = "List day subscriptions")]
    async fn list_subscriptions(&self) -> Result<Json<SubscriptionListResult>, String> {
        Ok(Json(SubscriptionListResult {
            subscriptions: self.subscriptions.list().await,
        }))
    }

    // === MCP Prompts ===

    #[prompt(
        name = "hydration-review",
        description = "Review a user's hydration against their goal and previous periods"
    )]
    async fn hydration_review(&self, params: Parameters<HydrationReviewParams>) -> GetPromptResult {
        let focus = params
            .0
            .focus
            .unwrap_or_else(|| "overall consistency".to_string());

        prompts::hydration_review_prompt(&params.0.user_id, &focus)
    }
}

#[tool_handler]
#[prompt_handler(router = self.prompt_router)]
impl rmcp::ServerHandler for HydrationMcpHandler {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo::new(
            rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .enable_resources()
                .build(),
        )
        .with_instructions(
            "Hydration tracker MCP server - computes daily water goals, logs drinks \
             and reports intake series and period-over-period insights.",
        )
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        let mut res = RawResource::new(DRINK_TYPES_URI, "Drink Types").no_annotation();
        res.description = Some("Beverage ids and display names accepted by log_drink".to_string());
        res.mime_type = Some("application/json".to_string());

        Ok(ListResourcesResult {
            resources: vec![res],
            next_cursor: None,
            meta: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        if request.uri == DRINK_TYPES_URI {
            let text = serde_json::to_string_pretty(&DRINK_TYPES)
                .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
            Ok(ReadResourceResult::new(vec![
                ResourceContents::TextResourceContents {
                    uri: request.uri.clone(),
                    mime_type: Some("application/json".to_string()),
                    text,
                    meta: None,
                },
            ]))
        } else {
            Err(ErrorData::invalid_params(
                format!("Unknown resource URI: {}", request.uri),
                None,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fixed_clock, seeded_store};
    use chrono::NaiveDate;
    use hydration_core::{ActivityLevel, Climate, PhysiologicalCategory};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
    }

    async fn handler() -> HydrationMcpHandler {
        let service = HydrationService::new(seeded_store(today()).await, Config::default())
            .with_clock(fixed_clock(today(), 12, 0));
        HydrationMcpHandler::from_service(service)
    }

    #[tokio::test]
    async fn handler_registers_tools_and_prompts() {
        let handler = handler().await;
        let _clone = handler.clone();
        let tools = handler.tool_router.list_all();
        for name in [
            "compute_daily_goal",
            "complete_onboarding",
            "set_daily_goal",
            "get_user_settings",
            "log_drink",
            "get_day_record",
            "get_intake_series",
            "get_hydration_summary",
            "list_drink_types",
            "subscribe_day",
            "get_subscription",
            "unsubscribe_day",
            "list_subscriptions",
        ] {
            assert!(tools.iter().any(|t| t.name == name), "missing tool {name}");
        }
        assert_eq!(handler.tool_count(), 13);
        assert_eq!(handler.prompt_count(), 1);
    }

    #[tokio::test]
    async fn compute_goal_tool_reports_liters() {
        let handler = handler().await;
        let Json(goal) = handler
            .compute_daily_goal(Parameters(UserProfile {
                weight_kg: 60.0,
                physiological_category: PhysiologicalCategory::Female,
                activity_level: ActivityLevel::Sedentary,
                climate: Climate::Moderate,
            }))
            .await
            .unwrap();
        assert_eq!(goal.daily_goal_ml, 2000);
        assert_eq!(goal.daily_goal_l, 2.0);
    }

    #[tokio::test]
    async fn compute_goal_tool_rejects_unknown_category() {
        let handler = handler().await;
        let err = handler
            .compute_daily_goal(Parameters(UserProfile {
                weight_kg: 60.0,
                physiological_category: PhysiologicalCategory::Unknown,
                activity_level: ActivityLevel::Sedentary,
                climate: Climate::Moderate,
            }))
            .await
            .err()
            .expect("rejected");
        assert!(err.contains("invalid input"));
    }

    #[tokio::test]
    async fn log_then_read_day_record() {
        let handler = handler().await;
        let Json(logged) = handler
            .log_drink(Parameters(LogDrinkParams {
                user_id: "u1".into(),
                drink: DrinkRequest {
                    amount_ml: 250,
                    drink_type: Some("coffee".into()),
                    ..Default::default()
                },
            }))
            .await
            .unwrap();
        assert_eq!(logged.record.total_amount_ml, 2250);
        assert_eq!(logged.progress_percent, 90);

        let Json(day) = handler
            .get_day_record(Parameters(DayParams {
                user_id: "u1".into(),
                date: None,
            }))
            .await
            .unwrap();
        assert_eq!(day.date, today());
        assert_eq!(day.record.map(|r| r.events.len()), Some(3));
    }

    #[tokio::test]
    async fn series_tool_rejects_unknown_granularity() {
        let handler = handler().await;
        let res = handler
            .get_intake_series(Parameters(SeriesParams {
                user_id: "u1".into(),
                granularity: "quarter".into(),
                anchor: None,
            }))
            .await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn unknown_subscription_is_not_found() {
        let handler = handler().await;
        let err = handler
            .get_subscription(Parameters(SubscriptionIdParam {
                subscription_id: "nope".into(),
            }))
            .await
            .err()
            .expect("missing");
        assert!(err.starts_with("Not found"));
        let Json(res) = handler
            .unsubscribe_day(Parameters(SubscriptionIdParam {
                subscription_id: "nope".into(),
            }))
            .await
            .unwrap();
        assert!(!res.cancelled);
    }

    #[tokio::test]
    async fn subscribe_with_blank_date_watches_today() {
        let handler = handler().await;
        let Json(started) = handler
            .subscribe_day(Parameters(DayParams {
                user_id: "u1".into(),
                date: Some("  ".into()),
            }))
            .await
            .unwrap();
        let Json(res) = handler
            .get_subscription(Parameters(SubscriptionIdParam {
                subscription_id: started.subscription_id,
            }))
            .await
            .unwrap();
        assert_eq!(res.status.date, today());
        assert_eq!(res.status.series.total_ml(), 2000);
    }

    #[tokio::test]
    async fn catalog_tool_lists_all_drinks() {
        let handler = handler().await;
        let Json(res) = handler.list_drink_types().await.unwrap();
        assert_eq!(res.drink_types.len(), 17);
    }

    #[test]
    fn log_filter_prefers_crate_variable() {
        let get = |k: &str| match k {
            "HYDRATION_LOG_LEVEL" => Some("debug".to_string()),
            "RUST_LOG" => Some("warn".to_string()),
            _ => None,
        };
        assert_eq!(resolve_log_filter(get), "debug");
        assert_eq!(resolve_log_filter(|_| None), "info");
    }
}
