//! Action dispatcher.
//!
//! Executes one corrected action against the page and appends exactly one
//! history line per decision. Never propagates errors: every
//! action-specific failure is caught, logged, and recorded as a history
//! entry so the next decision round sees the full context.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use cdp_driver::{DriverError, PageDriver};
use wayfinder_core_types::{persist_selector, AgentDecision, ScrollDirection};

use crate::config::AgentConfig;
use crate::correction::{correct, CorrectedAction};
use crate::history::ActionHistory;

/// Execute the decision's action, record the outcome in history, and run
/// post-action normalization when warranted.
pub async fn dispatch(
    driver: &dyn PageDriver,
    decision: &AgentDecision,
    history: &mut ActionHistory,
    config: &AgentConfig,
) {
    use wayfinder_core_types::AgentAction;

    match &decision.action {
        AgentAction::Error { message } => {
            history.push(format!("Decision error: {message}"));
            return;
        }
        AgentAction::Finished => return,
        _ => {}
    }

    // Observe the target's capability (if any) ahead of correction.
    let capability = match decision.action.element_id() {
        Some(element_id) => driver.describe_element(element_id).await.ok(),
        None => None,
    };
    let corrected = correct(&decision.action, capability.as_ref());
    let settle = corrected.needs_settle();

    match execute(driver, &corrected, &decision.thought, config).await {
        Ok(line) => {
            history.push(line);
            if settle {
                settle_after_action(driver, config).await;
            }
        }
        Err(err) => {
            warn!(action = decision.action.kind(), error = %err, "action failed");
            history.push(format!(
                "Failed to execute {}: {err}",
                decision.action.kind()
            ));
        }
    }
}

async fn execute(
    driver: &dyn PageDriver,
    corrected: &CorrectedAction,
    thought: &str,
    config: &AgentConfig,
) -> Result<String, DriverError> {
    match corrected {
        CorrectedAction::Navigate { url } => {
            driver.goto(url).await?;
            Ok(format!("Navigated to {url}"))
        }

        CorrectedAction::Click { element_id, .. } => {
            driver.click_element(*element_id).await?;
            Ok(format!("Clicked ID {element_id} ({thought})"))
        }

        CorrectedAction::SelectFromClick { element_id, value } => {
            info!(element_id, "click on native select corrected to option selection");
            driver.select_option(*element_id, value).await?;
            Ok(format!(
                "Selected \"{value}\" in dropdown ID {element_id} (auto-corrected from click)"
            ))
        }

        CorrectedAction::SelectNeedsValue { element_id } => {
            info!(element_id, "click on native select without a value; not guessing");
            Ok(format!(
                "Tried to click native select ID {element_id} but no value was provided — \
                 use action \"select\" with a value next time"
            ))
        }

        CorrectedAction::Type { element_id, value } => {
            let outcome = driver.type_into_element(*element_id, value).await?;
            if outcome.autocomplete_open {
                // Committing would dismiss the popup; leave it open and let
                // the next decision round pick the suggestion.
                Ok(format!(
                    "Typed \"{value}\" into ID {element_id} (autocomplete dropdown appeared — \
                     selection pending)"
                ))
            } else {
                driver
                    .evaluate(&commit_events_script(*element_id))
                    .await?;
                Ok(format!("Typed \"{value}\" into ID {element_id}"))
            }
        }

        CorrectedAction::ClickFromType { element_id } => {
            info!(element_id, "type on non-typeable element corrected to click");
            driver.click_element(*element_id).await?;
            Ok(format!("Clicked ID {element_id} (not a typeable element)"))
        }

        CorrectedAction::Select { element_id, value } => {
            driver.select_option(*element_id, value).await?;
            Ok(format!("Selected \"{value}\" in dropdown ID {element_id}"))
        }

        CorrectedAction::PressEnter => {
            driver.press_enter().await?;
            driver.pace(500, 1000).await;
            Ok("Pressed Enter".to_string())
        }

        CorrectedAction::Scroll { direction } => {
            driver
                .scroll_page(direction.delta(config.page_scroll_px))
                .await?;
            driver.pace(500, 1000).await;
            Ok(format!("Scrolled {} (main page)", dir_str(*direction)))
        }

        CorrectedAction::ScrollElement {
            element_id,
            direction,
        } => {
            driver
                .scroll_container(*element_id, direction.delta(config.container_scroll_px))
                .await?;
            driver.pace(1000, 1500).await;
            Ok(format!(
                "Scrolled container {element_id} {}",
                dir_str(*direction)
            ))
        }

        CorrectedAction::SkipMissingElement { element_id } => {
            Ok(format!(
                "Element ID {element_id} missing after tag removal — skipped"
            ))
        }
    }
}

/// Post-action normalization: bounded wait for network quiescence (timeout
/// absorbed), then scroll to the top so the next screenshot shows freshly
/// revealed content.
pub async fn settle_after_action(driver: &dyn PageDriver, config: &AgentConfig) {
    debug!("waiting for page to update after action");
    if let Err(err) = driver
        .wait_network_quiet(Duration::from_millis(config.settle_quiet_ms))
        .await
    {
        debug!(error = %err, "network did not go quiet, continuing");
    }
    if let Err(err) = driver.scroll_to_top().await {
        warn!(error = %err, "scroll to top failed");
    }
    driver.pace(800, 1200).await;
}

/// Frameworks that watch events rather than values need the full triad
/// after programmatic typing.
fn commit_events_script(element_id: u32) -> String {
    let selector = Value::String(persist_selector(element_id)).to_string();
    format!(
        r#"(() => {{
            const el = document.querySelector({selector});
            if (!el) return;
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            el.dispatchEvent(new Event('blur', {{ bubbles: true }}));
        }})()"#
    )
}

fn dir_str(direction: ScrollDirection) -> &'static str {
    match direction {
        ScrollDirection::Up => "up",
        ScrollDirection::Down => "down",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use wayfinder_core_types::{AgentAction, ElementCapability};

    #[derive(Default)]
    struct StubDriver {
        capability: Option<ElementCapability>,
        fail_clicks: bool,
        selected: Mutex<Vec<(u32, String)>>,
        clicked: Mutex<Vec<u32>>,
        settled: Mutex<bool>,
    }

    #[async_trait]
    impl PageDriver for StubDriver {
        async fn goto(&self, _url: &str) -> Result<(), DriverError> {
            Ok(())
        }
        async fn current_url(&self) -> Result<String, DriverError> {
            Ok("https://example.com".to_string())
        }
        async fn evaluate(&self, _script: &str) -> Result<Value, DriverError> {
            Ok(Value::Null)
        }
        async fn screenshot_jpeg(&self, _quality: u8) -> Result<Vec<u8>, DriverError> {
            Ok(Vec::new())
        }
        async fn wait_dom_ready(&self, _timeout: Duration) -> Result<(), DriverError> {
            Ok(())
        }
        async fn wait_network_quiet(&self, _timeout: Duration) -> Result<(), DriverError> {
            Ok(())
        }
        async fn press_enter(&self) -> Result<(), DriverError> {
            Ok(())
        }
        async fn element_exists(&self, _element_id: u32) -> Result<bool, DriverError> {
            Ok(self.capability.is_some())
        }
        async fn describe_element(
            &self,
            element_id: u32,
        ) -> Result<ElementCapability, DriverError> {
            self.capability
                .clone()
                .ok_or_else(|| DriverError::missing_element(element_id))
        }
        async fn click_element(&self, element_id: u32) -> Result<(), DriverError> {
            if self.fail_clicks {
                return Err(DriverError::Input("synthetic click failure".to_string()));
            }
            self.clicked.lock().unwrap().push(element_id);
            Ok(())
        }
        async fn type_into_element(
            &self,
            _element_id: u32,
            _text: &str,
        ) -> Result<cdp_driver::TypeOutcome, DriverError> {
            Ok(cdp_driver::TypeOutcome::default())
        }
        async fn select_option(&self, element_id: u32, value: &str) -> Result<(), DriverError> {
            self.selected
                .lock()
                .unwrap()
                .push((element_id, value.to_string()));
            Ok(())
        }
        async fn scroll_container(
            &self,
            _element_id: u32,
            _delta_y: i64,
        ) -> Result<(), DriverError> {
            Ok(())
        }
        async fn scroll_page(&self, _delta_y: i64) -> Result<(), DriverError> {
            Ok(())
        }
        async fn scroll_to_top(&self) -> Result<(), DriverError> {
            *self.settled.lock().unwrap() = true;
            Ok(())
        }
        async fn pace(&self, _min_ms: u64, _max_ms: u64) {}
    }

    fn decision(action: AgentAction) -> AgentDecision {
        AgentDecision {
            thought: "testing".to_string(),
            action,
        }
    }

    #[tokio::test]
    async fn click_on_select_dispatches_selection_never_a_click() {
        let driver = StubDriver {
            capability: Some(ElementCapability {
                tag_name: "select".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut history = ActionHistory::new();
        let config = AgentConfig::default();

        dispatch(
            &driver,
            &decision(AgentAction::Click {
                element_id: 9,
                value: Some("2021".to_string()),
            }),
            &mut history,
            &config,
        )
        .await;

        assert!(driver.clicked.lock().unwrap().is_empty());
        assert_eq!(
            driver.selected.lock().unwrap().as_slice(),
            &[(9, "2021".to_string())]
        );
        assert!(history.entries()[0].contains("auto-corrected from click"));
        assert!(*driver.settled.lock().unwrap(), "selection should settle");
    }

    #[tokio::test]
    async fn missing_element_is_recorded_not_fatal() {
        let driver = StubDriver::default();
        let mut history = ActionHistory::new();
        dispatch(
            &driver,
            &decision(AgentAction::Click {
                element_id: 3,
                value: None,
            }),
            &mut history,
            &AgentConfig::default(),
        )
        .await;
        assert!(history.entries()[0].contains("missing after tag removal"));
    }

    #[tokio::test]
    async fn driver_failure_becomes_a_history_entry() {
        let driver = StubDriver {
            capability: Some(ElementCapability {
                tag_name: "a".to_string(),
                ..Default::default()
            }),
            fail_clicks: true,
            ..Default::default()
        };
        let mut history = ActionHistory::new();
        dispatch(
            &driver,
            &decision(AgentAction::Click {
                element_id: 5,
                value: None,
            }),
            &mut history,
            &AgentConfig::default(),
        )
        .await;
        assert_eq!(history.len(), 1);
        assert!(history.entries()[0].starts_with("Failed to execute click"));
    }

    #[tokio::test]
    async fn decision_error_only_appends_history() {
        let driver = StubDriver::default();
        let mut history = ActionHistory::new();
        dispatch(
            &driver,
            &AgentDecision::error("inference transport error"),
            &mut history,
            &AgentConfig::default(),
        )
        .await;
        assert!(history.entries()[0].starts_with("Decision error:"));
        assert!(!*driver.settled.lock().unwrap());
    }
}
