//! Durable session records shared between the recorder and the ingestor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-session goal-refinement record (`refined-goal.json`).
///
/// Written once by the planner at the start of a run; read back by the
/// memory ingestor to recover what the session was trying to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalRecord {
    pub original_goal: String,
    pub refined_goal: String,
    pub starting_url: String,
    pub timestamp: DateTime<Utc>,
}

impl GoalRecord {
    pub fn new(
        original_goal: impl Into<String>,
        refined_goal: impl Into<String>,
        starting_url: impl Into<String>,
    ) -> Self {
        Self {
            original_goal: original_goal.into(),
            refined_goal: refined_goal.into(),
            starting_url: starting_url.into(),
            timestamp: Utc::now(),
        }
    }

    /// The goal text the cache should key on: the user's own words when
    /// present, the refined restatement otherwise.
    pub fn cache_goal(&self) -> &str {
        if self.original_goal.trim().is_empty() {
            &self.refined_goal
        } else {
            &self.original_goal
        }
    }
}
