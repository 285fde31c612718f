//! Decision requestor: one prompt in, one structured decision out.
//!
//! The element summary is a compact line-oriented listing rather than a
//! structural dump; the inference service is token-budget constrained, and
//! layout information travels visually through the rendered overlays when a
//! screenshot is attached. Requests are deterministic (zero temperature).

use tracing::{debug, warn};

use llm_gateway::InferenceClient;
use wayfinder_core_types::{AgentDecision, ElementRecord, RawDecision};

use crate::history::ActionHistory;

/// One decision round's full output. Prompt and raw response are retained
/// for the session recorder, not for control flow.
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub decision: AgentDecision,
    pub prompt: String,
    pub raw_response: String,
}

/// One prompt line per element, attributes present-only.
pub fn format_element_line(record: &ElementRecord) -> String {
    if record.is_scroll_container() {
        return format!(
            "[S:{}] SCROLLABLE {} (height: {}px, scrollable: {}px) class=\"{}\" visible: \"{}\"",
            record.id,
            record.tag_name,
            record.client_height.unwrap_or(0),
            record.scroll_height.unwrap_or(0),
            record.class_name.as_deref().unwrap_or(""),
            record.visible_content.as_deref().unwrap_or(""),
        );
    }

    let mut parts = vec![format!("[{}] {}", record.id, record.tag_name)];
    let mut push = |label: &str, value: &Option<String>| {
        if let Some(v) = value {
            parts.push(format!("{label}=\"{v}\""));
        }
    };
    push("text", &record.text);
    push("placeholder", &record.placeholder);
    push("type", &record.input_type);
    push("value", &record.value);
    push("aria-label", &record.aria_label);
    push("title", &record.title);
    push("role", &record.role);
    parts.join(" ")
}

/// Assemble the decision prompt from goal, history window and element map.
pub fn build_prompt(goal: &str, history: &[String], elements: &[ElementRecord]) -> String {
    let element_summary = elements
        .iter()
        .map(format_element_line)
        .collect::<Vec<_>>()
        .join("\n");
    let history_block = if history.is_empty() {
        "(no actions yet)".to_string()
    } else {
        history.join("\n")
    };

    format!(
        r#"You are a browser automation agent. Goal: "{goal}".

Attached is a screenshot of the current page.
- RED LABELS (e.g. "5"): clickable elements (buttons, links, inputs).
- BLUE LABELS (e.g. "S:12"): SCROLLABLE AREAS (sidebars, lists, modals).

DOM ELEMENTS (with details):
{element_summary}

Recent action history:
{history_block}

INSTRUCTIONS:
1. NAVIGATION PRIORITY (in order of preference):
   a) SEARCH BAR FIRST: if the page has a search input, use it — type the
      site name or query, then press enter. Search bars are the most
      reliable way to navigate.
   b) Direct URL: if no search bar is available and you know the exact URL,
      use action "navigate" with the full URL.
   c) Clicking links: only as a last resort.
2. Identify the element that moves you toward the goal (or closes a popup).
3. If a popup/modal blocks the view, close it first (look for an 'X' or
   'Close' button).
4. INTERACTING WITH INPUTS:
   - For text/number inputs: action "type" with the elementId and value.
   - After typing into a search box, use action "press_enter" to submit
     (no elementId needed).
   - For combobox/button elements (role="combobox"): "click" to open them,
     then click the option you want. Never type into buttons or comboboxes.
5. SELECTING FROM DROPDOWNS:
   - Native <select> dropdowns: action "select" with elementId and the
     value or label you want.
   - Custom dropdowns: first CLICK the combobox to open it, scroll the
     container with "scroll_element" if needed, then CLICK the option.
6. SCROLLING:
   - If the target option is hidden inside a scrollable list, use
     "scroll_element" on the BLUE tag (S:XX) — its visible content is shown
     in the DOM summary, so you can tell whether scrolling is needed.
   - Do not scroll the whole page when a sidebar/modal exists; scroll that
     container directly.
   - Main page: action "scroll" with direction "down" or "up".
7. Use the DOM element details above to understand what each element does.
8. Return JSON ONLY (no markdown):

{{
    "thought": "brief reasoning",
    "action": "click" | "type" | "select" | "navigate" | "scroll" | "scroll_element" | "press_enter" | "finished",
    "elementId": number (the number in the red/blue label - required for click/type/select/scroll_element),
    "value": string (if typing or selecting),
    "direction": "down" | "up" (if scrolling),
    "url": string (if navigating - full URL like "https://example.com")
}}"#
    )
}

/// Ask the inference service for the next action.
///
/// Degrades to an `error`-kind decision on any failure (transport, API,
/// malformed payload, missing required fields) so the loop can
/// re-observe and retry instead of crashing the run.
pub async fn request_decision(
    llm: &dyn InferenceClient,
    goal: &str,
    history: &ActionHistory,
    elements: &[ElementRecord],
    screenshot_base64: Option<&str>,
    history_window: usize,
) -> DecisionOutcome {
    let prompt = build_prompt(goal, history.recent(history_window), elements);

    let response = match screenshot_base64 {
        Some(image) => llm.complete_json_with_image(&prompt, image).await,
        None => llm.complete_json(&prompt).await,
    };

    match response {
        Ok(raw) => {
            let decision = parse_decision(&raw).unwrap_or_else(|reason| {
                warn!(reason, "decision payload rejected");
                AgentDecision::error(reason)
            });
            debug!(action = decision.action.kind(), "decision received");
            DecisionOutcome {
                decision,
                prompt,
                raw_response: raw,
            }
        }
        Err(err) => {
            warn!(error = %err, "inference request failed");
            let message = err.to_string();
            DecisionOutcome {
                decision: AgentDecision::error(message.clone()),
                prompt,
                raw_response: format!("Error: {message}"),
            }
        }
    }
}

/// Parse the raw response text into a typed decision.
fn parse_decision(raw: &str) -> Result<AgentDecision, String> {
    let trimmed = strip_code_fence(raw.trim());
    let parsed: RawDecision =
        serde_json::from_str(trimmed).map_err(|err| format!("unparseable decision: {err}"))?;
    parsed
        .into_decision()
        .map_err(|err| format!("invalid decision: {err}"))
}

/// JSON mode forbids markdown, but some models fence anyway.
fn strip_code_fence(raw: &str) -> &str {
    let Some(inner) = raw.strip_prefix("```") else {
        return raw;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim().strip_suffix("```").unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_gateway::ScriptedInference;
    use wayfinder_core_types::{AgentAction, ElementKind};

    fn button(id: u32, text: &str) -> ElementRecord {
        let mut record = ElementRecord::new(id, ElementKind::Interactive, "button");
        record.text = Some(text.to_string());
        record
    }

    #[test]
    fn element_line_lists_present_attributes_only() {
        let mut record = ElementRecord::new(5, ElementKind::Interactive, "input");
        record.placeholder = Some("Search".to_string());
        record.input_type = Some("text".to_string());
        let line = format_element_line(&record);
        assert_eq!(line, "[5] input placeholder=\"Search\" type=\"text\"");
    }

    #[test]
    fn scroll_container_line_carries_extents_and_preview() {
        let mut record = ElementRecord::new(12, ElementKind::ScrollContainer, "div");
        record.scroll_height = Some(2400);
        record.client_height = Some(600);
        record.class_name = Some("year-list".to_string());
        record.visible_content = Some("2024, 2023".to_string());
        let line = format_element_line(&record);
        assert!(line.starts_with("[S:12] SCROLLABLE div"));
        assert!(line.contains("height: 600px"));
        assert!(line.contains("scrollable: 2400px"));
        assert!(line.contains("2024, 2023"));
    }

    #[test]
    fn prompt_includes_goal_elements_and_history() {
        let prompt = build_prompt(
            "find 2021 CRVs",
            &["Clicked ID 3".to_string()],
            &[button(3, "Filters")],
        );
        assert!(prompt.contains("find 2021 CRVs"));
        assert!(prompt.contains("[3] button text=\"Filters\""));
        assert!(prompt.contains("Clicked ID 3"));
        assert!(prompt.contains("Return JSON ONLY"));
    }

    #[tokio::test]
    async fn malformed_response_degrades_to_error_decision() {
        let llm = ScriptedInference::new().with_default("not json at all");
        let outcome = request_decision(
            &llm,
            "goal",
            &ActionHistory::new(),
            &[],
            None,
            5,
        )
        .await;
        assert!(matches!(
            outcome.decision.action,
            AgentAction::Error { .. }
        ));
        assert_eq!(outcome.raw_response, "not json at all");
    }

    #[tokio::test]
    async fn fenced_json_is_tolerated() {
        let llm = ScriptedInference::new()
            .with_default("```json\n{\"action\":\"finished\",\"thought\":\"done\"}\n```");
        let outcome =
            request_decision(&llm, "goal", &ActionHistory::new(), &[], None, 5).await;
        assert!(outcome.decision.is_finished());
    }

    #[tokio::test]
    async fn history_window_limits_what_the_model_sees() {
        let llm = ScriptedInference::new().with_default(r#"{"action":"finished"}"#);
        let mut history = ActionHistory::new();
        for i in 0..10 {
            history.push(format!("entry {i}"));
        }
        let outcome = request_decision(&llm, "goal", &history, &[], None, 5).await;
        assert!(!outcome.prompt.contains("entry 4"));
        assert!(outcome.prompt.contains("entry 5"));
        assert!(outcome.prompt.contains("entry 9"));
    }
}
