use rmcp::model::{GetPromptResult, PromptMessage, PromptMessageRole};

pub fn hydration_review_prompt(user_id: &str, focus: &str) -> GetPromptResult {
    GetPromptResult::new(vec![PromptMessage::new_text(
            PromptMessageRole::User,
            format!(
                "Review the hydration habits of user {user_id}, focusing on {focus}.\n\nInclude:\n1. Today's intake against the daily goal\n2. Daily average over the last 30 days and how it moved against the 30 days before\n3. This week's total against last week\n4. Monthly goal completion and its change in points\n5. Best and worst time of day to drink\n6. The current streak\n\nUse get_user_settings for the goal and streak, get_hydration_summary for the comparisons, and get_intake_series with granularity week or month when a chart helps. Finish with two or three concrete suggestions."
            ),
        )])
    .with_description(format!("Hydration review for {user_id}"))
}
