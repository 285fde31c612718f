//! Starting-page planning.
//!
//! Before the loop starts, the raw goal is turned into a starting URL and a
//! refined goal statement. Any planning failure falls back to a search
//! engine start; planning is a shortcut, never a gate.

use serde::Deserialize;
use tracing::{info, warn};

use llm_gateway::InferenceClient;

/// Default start when the planner cannot do better.
pub const FALLBACK_START_URL: &str = "https://duckduckgo.com";

/// Where the run begins and what it is trying to do.
#[derive(Debug, Clone, PartialEq)]
pub struct StartPlan {
    pub url: String,
    pub refined_goal: String,
}

#[derive(Deserialize)]
struct PlannerResponse {
    url: Option<String>,
    refined_goal: Option<String>,
    #[allow(dead_code)]
    reasoning: Option<String>,
}

fn planning_prompt(goal: &str) -> String {
    format!(
        r#"You are a browser automation agent. Your goal is: "{goal}"

Based on this goal, what is the best starting URL to begin from?

RULES:
- If the goal mentions a specific website (like "clutch.ca" or "amazon.com"), return that website's URL.
- If the goal is about searching or finding information, return "https://duckduckgo.com".
- If you are unsure, return "https://duckduckgo.com".
- Always return a full URL starting with https://.
- Also restate the goal as one clear, self-contained instruction.

Return ONLY JSON, no markdown:
{{
    "url": "https://example.com",
    "refined_goal": "one clear instruction",
    "reasoning": "brief explanation"
}}"#
    )
}

/// Resolve the starting URL and refined goal for a run.
pub async fn determine_start(llm: &dyn InferenceClient, goal: &str) -> StartPlan {
    let fallback = StartPlan {
        url: FALLBACK_START_URL.to_string(),
        refined_goal: goal.to_string(),
    };

    let raw = match llm.complete_json(&planning_prompt(goal)).await {
        Ok(raw) => raw,
        Err(err) => {
            warn!(error = %err, "starting-page planning failed, using fallback");
            return fallback;
        }
    };

    match serde_json::from_str::<PlannerResponse>(&raw) {
        Ok(parsed) => {
            let url = parsed
                .url
                .filter(|u| u.starts_with("http"))
                .unwrap_or(fallback.url);
            let refined_goal = parsed
                .refined_goal
                .filter(|g| !g.trim().is_empty())
                .unwrap_or(fallback.refined_goal);
            info!(url, "starting page resolved");
            StartPlan { url, refined_goal }
        }
        Err(err) => {
            warn!(error = %err, "planner response unparseable, using fallback");
            fallback
        }
    }
}
