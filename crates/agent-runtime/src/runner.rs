//! The agent control loop.
//!
//! States: Planning → (Observing → Deciding → Acting)* → Finished, with a
//! fixed step ceiling as the only forced-termination path. Each iteration
//! is strictly sequential (tagging, decision, action) because every
//! step's decision depends on the state the previous step left behind.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::time::Duration;
use tracing::{info, warn};

use cdp_driver::PageDriver;
use llm_gateway::InferenceClient;
use wayfinder_core_types::GoalRecord;

use crate::config::AgentConfig;
use crate::decision::request_decision;
use crate::dispatch::dispatch;
use crate::history::ActionHistory;
use crate::planner;
use crate::recorder::{SessionRecorder, StepArtifacts};
use crate::tagger;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The decision step returned `finished`.
    Finished,
    /// The step ceiling was reached first.
    BudgetExhausted,
}

/// Final result of one agent run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub steps_taken: u32,
    pub history: Vec<String>,
    pub final_url: Option<String>,
    pub session_id: String,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Finished
    }
}

/// A resolved starting point, either from the session cache or from the
/// starting-page planner.
#[derive(Debug, Clone)]
pub struct StartPoint {
    pub url: String,
    pub refined_goal: String,
    /// True when the URL came from a cache hit rather than planning.
    pub from_cache: bool,
}

/// Owns step counting, termination, and the composition of tagger,
/// decision requestor and dispatcher.
pub struct AgentRunner {
    driver: Arc<dyn PageDriver>,
    llm: Arc<dyn InferenceClient>,
    config: AgentConfig,
}

impl AgentRunner {
    pub fn new(
        driver: Arc<dyn PageDriver>,
        llm: Arc<dyn InferenceClient>,
        config: AgentConfig,
    ) -> Self {
        Self {
            driver,
            llm,
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Drive the browser toward `goal`, recording every step.
    ///
    /// `start` short-circuits planning; a cache hit lands the run directly
    /// on a known-good URL and the loop resumes from there.
    pub async fn run(
        &self,
        goal: &str,
        start: Option<StartPoint>,
        recorder: &SessionRecorder,
    ) -> RunReport {
        let driver = self.driver.as_ref();

        // Planning: resolve starting URL and refined goal.
        let start = match start {
            Some(start) => {
                info!(url = %start.url, from_cache = start.from_cache, "starting from resolved URL");
                start
            }
            None => {
                let plan = planner::determine_start(self.llm.as_ref(), goal).await;
                StartPoint {
                    url: plan.url,
                    refined_goal: plan.refined_goal,
                    from_cache: false,
                }
            }
        };
        recorder.record_goal(&GoalRecord::new(
            goal,
            start.refined_goal.as_str(),
            start.url.as_str(),
        ));

        let mut history = ActionHistory::new();
        if let Err(err) = driver.goto(&start.url).await {
            // Not fatal: the agent can still navigate from a blank page.
            warn!(error = %err, url = %start.url, "initial navigation failed");
            history.push(format!("Failed to open starting URL {}: {err}", start.url));
        }

        let mut step = 0u32;
        while step < self.config.max_steps {
            step += 1;
            info!(step, max = self.config.max_steps, "agent step");

            // Observing: let the page settle, then tag and snapshot.
            if let Err(err) = driver
                .wait_dom_ready(Duration::from_millis(self.config.dom_ready_ms))
                .await
            {
                warn!(error = %err, "page not ready, observing anyway");
            }
            driver.pace(1000, 2000).await;

            let elements = match tagger::tag_page(driver).await {
                Ok(elements) => elements,
                Err(err) => {
                    warn!(error = %err, "tagging failed, skipping step");
                    history.push(format!("Failed to observe page: {err}"));
                    continue;
                }
            };
            info!(elements = elements.len(), "interactive elements found");

            let screenshot = if self.config.enable_vision {
                match driver.screenshot_jpeg(self.config.screenshot_quality).await {
                    Ok(bytes) => Some(bytes),
                    Err(err) => {
                        warn!(error = %err, "screenshot failed, deciding without vision");
                        None
                    }
                }
            } else {
                None
            };
            let screenshot_base64 = screenshot.as_deref().map(|bytes| BASE64.encode(bytes));

            // Deciding.
            driver.pace(1000, 2000).await;
            let outcome = request_decision(
                self.llm.as_ref(),
                &start.refined_goal,
                &history,
                &elements,
                screenshot_base64.as_deref(),
                self.config.history_window,
            )
            .await;
            info!(action = outcome.decision.action.kind(), "decision");

            let url = driver.current_url().await.unwrap_or_default();
            recorder.record_step(
                step,
                &StepArtifacts {
                    screenshot: screenshot.as_deref(),
                    elements: &elements,
                    decision: &outcome.decision,
                    url: &url,
                    prompt: &outcome.prompt,
                    response: &outcome.raw_response,
                },
            );

            // Overlays must be gone before the dispatcher touches the page.
            tagger::remove_tags(driver).await;

            if outcome.decision.is_finished() {
                info!(steps = step, "goal achieved");
                return self.report(RunOutcome::Finished, step, history, recorder).await;
            }

            // Acting.
            dispatch(driver, &outcome.decision, &mut history, &self.config).await;
        }

        info!(steps = step, "step budget exhausted");
        self.report(RunOutcome::BudgetExhausted, step, history, recorder)
            .await
    }

    async fn report(
        &self,
        outcome: RunOutcome,
        steps_taken: u32,
        history: ActionHistory,
        recorder: &SessionRecorder,
    ) -> RunReport {
        RunReport {
            outcome,
            steps_taken,
            history: history.into_entries(),
            final_url: self.driver.current_url().await.ok(),
            session_id: recorder.session_id().to_string(),
        }
    }
}
