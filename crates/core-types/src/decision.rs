//! The decision contract spoken with the inference service.
//!
//! The inference service answers with a flat JSON object (`thought`,
//! `action`, `elementId`, `value`, `direction`, `url`). That wire shape is
//! parsed through the tolerant [`RawDecision`] intermediate and converted
//! into the closed [`AgentAction`] sum type, so a missing required field is
//! an explicit, recoverable conversion result instead of a runtime guess.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Direction for page and container scrolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    /// Signed pixel delta for this direction.
    pub fn delta(self, magnitude: i64) -> i64 {
        match self {
            ScrollDirection::Up => -magnitude,
            ScrollDirection::Down => magnitude,
        }
    }
}

/// One decision round's structured output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDecision {
    #[serde(default)]
    pub thought: String,
    #[serde(flatten)]
    pub action: AgentAction,
}

impl AgentDecision {
    /// Decision of kind `error`, substituted whenever the inference round
    /// fails so the loop can re-observe instead of crashing.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            thought: String::new(),
            action: AgentAction::Error {
                message: message.into(),
            },
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.action, AgentAction::Finished)
    }
}

/// The closed set of atomic actions the agent can take.
///
/// One payload shape per kind; `element_id` fields always reference an
/// identifier from the most recent tagging pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentAction {
    Click {
        element_id: u32,
        /// Some models name the option they intend to pick while clicking a
        /// dropdown; kept so the click-on-select correction can use it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    Type {
        element_id: u32,
        value: String,
    },
    Select {
        element_id: u32,
        value: String,
    },
    Navigate {
        url: String,
    },
    Scroll {
        direction: ScrollDirection,
    },
    ScrollElement {
        element_id: u32,
        direction: ScrollDirection,
    },
    PressEnter,
    Finished,
    Error {
        message: String,
    },
}

impl AgentAction {
    /// Short kind name for history lines and logging.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentAction::Click { .. } => "click",
            AgentAction::Type { .. } => "type",
            AgentAction::Select { .. } => "select",
            AgentAction::Navigate { .. } => "navigate",
            AgentAction::Scroll { .. } => "scroll",
            AgentAction::ScrollElement { .. } => "scroll_element",
            AgentAction::PressEnter => "press_enter",
            AgentAction::Finished => "finished",
            AgentAction::Error { .. } => "error",
        }
    }

    /// Identifier this action targets, when it targets one.
    pub fn element_id(&self) -> Option<u32> {
        match self {
            AgentAction::Click { element_id, .. }
            | AgentAction::Type { element_id, .. }
            | AgentAction::Select { element_id, .. }
            | AgentAction::ScrollElement { element_id, .. } => Some(*element_id),
            _ => None,
        }
    }
}

/// Why a raw decision could not be converted into a typed one.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecisionConvertError {
    #[error("decision carries no action kind")]
    MissingAction,
    #[error("unknown action kind `{0}`")]
    UnknownAction(String),
    #[error("action `{action}` requires field `{field}`")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },
    #[error("`{raw}` is not usable as an element identifier")]
    BadElementId { raw: String },
}

/// The flat wire shape as the model emits it, before validation.
///
/// `elementId` may arrive as a number or as a string, including the
/// `S:`-prefixed form the overlays use for scroll containers; `value` may
/// arrive as a number (years, quantities) and is normalized to a string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawDecision {
    pub thought: Option<String>,
    pub action: Option<String>,
    #[serde(alias = "elementId")]
    pub element_id: Option<Value>,
    pub value: Option<Value>,
    pub direction: Option<String>,
    pub url: Option<String>,
}

impl RawDecision {
    /// Validate and convert into the typed decision.
    pub fn into_decision(self) -> Result<AgentDecision, DecisionConvertError> {
        let thought = self.thought.clone().unwrap_or_default();
        let action = self.convert_action()?;
        Ok(AgentDecision { thought, action })
    }

    fn convert_action(&self) -> Result<AgentAction, DecisionConvertError> {
        let kind = self
            .action
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(DecisionConvertError::MissingAction)?;

        match kind {
            "click" => Ok(AgentAction::Click {
                element_id: self.require_element_id("click")?,
                value: self.value_as_string(),
            }),
            "type" => Ok(AgentAction::Type {
                element_id: self.require_element_id("type")?,
                value: self.require_value("type")?,
            }),
            "select" => Ok(AgentAction::Select {
                element_id: self.require_element_id("select")?,
                value: self.require_value("select")?,
            }),
            "navigate" | "goToURL" | "go_to_url" => {
                let url = self
                    .url
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or(DecisionConvertError::MissingField {
                        action: "navigate",
                        field: "url",
                    })?;
                Ok(AgentAction::Navigate {
                    url: url.to_string(),
                })
            }
            "scroll" => Ok(AgentAction::Scroll {
                direction: self.direction_or_down(),
            }),
            "scroll_element" => Ok(AgentAction::ScrollElement {
                element_id: self.require_element_id("scroll_element")?,
                direction: self.direction_or_down(),
            }),
            "press_enter" => Ok(AgentAction::PressEnter),
            "finished" => Ok(AgentAction::Finished),
            "error" => Ok(AgentAction::Error {
                message: self
                    .value_as_string()
                    .or_else(|| self.thought.clone())
                    .unwrap_or_else(|| "unspecified decision error".to_string()),
            }),
            other => Err(DecisionConvertError::UnknownAction(other.to_string())),
        }
    }

    fn require_element_id(&self, action: &'static str) -> Result<u32, DecisionConvertError> {
        let raw = self
            .element_id
            .as_ref()
            .ok_or(DecisionConvertError::MissingField {
                action,
                field: "elementId",
            })?;
        parse_element_id(raw).ok_or_else(|| DecisionConvertError::BadElementId {
            raw: raw.to_string(),
        })
    }

    fn require_value(&self, action: &'static str) -> Result<String, DecisionConvertError> {
        self.value_as_string()
            .ok_or(DecisionConvertError::MissingField {
                action,
                field: "value",
            })
    }

    fn value_as_string(&self) -> Option<String> {
        match self.value.as_ref()? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn direction_or_down(&self) -> ScrollDirection {
        match self.direction.as_deref().map(str::trim) {
            Some(d) if d.eq_ignore_ascii_case("up") => ScrollDirection::Up,
            _ => ScrollDirection::Down,
        }
    }
}

/// Accepts numbers and strings, stripping the scroll-container `S:` prefix
/// the overlays render (the model echoes labels like `"S:104"` back).
fn parse_element_id(raw: &Value) -> Option<u32> {
    match raw {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => {
            let trimmed = s.trim();
            let stripped = trimmed
                .strip_prefix("S:")
                .or_else(|| trimmed.strip_prefix("s:"))
                .unwrap_or(trimmed);
            stripped.parse::<u32>().ok()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> RawDecision {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn click_converts_with_camel_case_element_id() {
        let decision = raw(r#"{"thought":"open the year filter","action":"click","elementId":140}"#)
            .into_decision()
            .unwrap();
        assert_eq!(
            decision.action,
            AgentAction::Click {
                element_id: 140,
                value: None
            }
        );
        assert_eq!(decision.thought, "open the year filter");
    }

    #[test]
    fn go_to_url_alias_maps_to_navigate() {
        let decision = raw(r#"{"action":"goToURL","url":"https://example.com"}"#)
            .into_decision()
            .unwrap();
        assert_eq!(
            decision.action,
            AgentAction::Navigate {
                url: "https://example.com".to_string()
            }
        );
    }

    #[test]
    fn scroll_element_strips_container_prefix() {
        let decision = raw(r#"{"action":"scroll_element","elementId":"S:104","direction":"up"}"#)
            .into_decision()
            .unwrap();
        assert_eq!(
            decision.action,
            AgentAction::ScrollElement {
                element_id: 104,
                direction: ScrollDirection::Up
            }
        );
    }

    #[test]
    fn scroll_defaults_to_down() {
        let decision = raw(r#"{"action":"scroll"}"#).into_decision().unwrap();
        assert_eq!(
            decision.action,
            AgentAction::Scroll {
                direction: ScrollDirection::Down
            }
        );
    }

    #[test]
    fn numeric_value_is_normalized_to_string() {
        let decision = raw(r#"{"action":"select","elementId":7,"value":2021}"#)
            .into_decision()
            .unwrap();
        assert_eq!(
            decision.action,
            AgentAction::Select {
                element_id: 7,
                value: "2021".to_string()
            }
        );
    }

    #[test]
    fn type_without_value_is_a_missing_field() {
        let err = raw(r#"{"action":"type","elementId":3}"#)
            .into_decision()
            .unwrap_err();
        assert_eq!(
            err,
            DecisionConvertError::MissingField {
                action: "type",
                field: "value"
            }
        );
    }

    #[test]
    fn unknown_action_is_reported() {
        let err = raw(r#"{"action":"teleport"}"#).into_decision().unwrap_err();
        assert_eq!(err, DecisionConvertError::UnknownAction("teleport".into()));
    }

    #[test]
    fn typed_decision_serializes_with_flat_action_tag() {
        let decision = AgentDecision {
            thought: "done".to_string(),
            action: AgentAction::Finished,
        };
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["action"], "finished");
        assert_eq!(json["thought"], "done");

        let back: AgentDecision = serde_json::from_value(json).unwrap();
        assert!(back.is_finished());
    }

    #[test]
    fn scroll_delta_is_signed() {
        assert_eq!(ScrollDirection::Up.delta(400), -400);
        assert_eq!(ScrollDirection::Down.delta(800), 800);
    }
}
