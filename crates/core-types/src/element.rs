//! Element records produced by a tagging pass over the live page.

use serde::{Deserialize, Serialize};

/// DOM attribute that carries an element's persisted identifier across
/// tagging passes. The tagger writes it, the driver addresses elements
/// through it.
pub const PERSIST_ATTR: &str = "data-wf-id";

/// CSS selector addressing the element that carries `id`.
pub fn persist_selector(id: u32) -> String {
    format!("[{PERSIST_ATTR}=\"{id}\"]")
}

/// Classification of a tagged element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    /// Clickable/typeable controls: buttons, links, inputs, selects and
    /// their ARIA equivalents.
    Interactive,
    /// An element whose vertical overflow is independently scrollable.
    ScrollContainer,
}

/// One interactive or scrollable node visible at tagging time.
///
/// Attributes are a present-only bag: absent values are omitted from the
/// serialized form and from the prompt summary. Identifiers are unique
/// within a pass and stable across passes for elements that persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRecord {
    pub id: u32,
    pub kind: ElementKind,
    pub tag_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    // Scroll-container side channel: lets the decision step judge whether
    // scrolling is needed without another screenshot round-trip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_height: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_height: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_content: Option<String>,
}

impl ElementRecord {
    /// Bare record with no descriptive attributes.
    pub fn new(id: u32, kind: ElementKind, tag_name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            tag_name: tag_name.into(),
            text: None,
            placeholder: None,
            input_type: None,
            value: None,
            aria_label: None,
            title: None,
            role: None,
            scroll_height: None,
            client_height: None,
            class_name: None,
            visible_content: None,
        }
    }

    pub fn is_scroll_container(&self) -> bool {
        self.kind == ElementKind::ScrollContainer
    }
}

/// What the driver can observe about an element before acting on it.
///
/// The dispatcher's correction policy maps (requested action, capability)
/// onto the action actually executed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementCapability {
    pub tag_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(default)]
    pub content_editable: bool,
}

impl ElementCapability {
    /// Native `<select>` controls cannot be opened by clicking; they need
    /// option selection instead.
    pub fn is_native_select(&self) -> bool {
        self.tag_name.eq_ignore_ascii_case("select")
    }

    /// Whether character input can land in this element.
    pub fn is_typeable(&self) -> bool {
        if self.content_editable {
            return true;
        }
        match self.tag_name.to_ascii_lowercase().as_str() {
            "textarea" => true,
            "input" => !matches!(
                self.input_type.as_deref().unwrap_or("text"),
                "button" | "submit" | "reset" | "checkbox" | "radio" | "file" | "image" | "range"
            ),
            _ => false,
        }
    }

    /// Clicks on these controls typically swap the displayed content, so
    /// the page is normalized (scrolled to top) afterwards.
    pub fn warrants_settle_after_click(&self) -> bool {
        if self.tag_name.eq_ignore_ascii_case("button") {
            return true;
        }
        matches!(self.role.as_deref(), Some("button") | Some("combobox"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persist_selector_addresses_attribute() {
        assert_eq!(persist_selector(17), "[data-wf-id=\"17\"]");
    }

    #[test]
    fn record_serialization_omits_absent_attributes() {
        let record = ElementRecord::new(3, ElementKind::Interactive, "button");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"id\":3"));
        assert!(json.contains("\"kind\":\"interactive\""));
        assert!(!json.contains("placeholder"));
        assert!(!json.contains("scroll_height"));
    }

    #[test]
    fn scroll_container_round_trips() {
        let mut record = ElementRecord::new(9, ElementKind::ScrollContainer, "div");
        record.scroll_height = Some(2400);
        record.client_height = Some(600);
        record.visible_content = Some("2021, 2020, 2019".to_string());

        let json = serde_json::to_string(&record).unwrap();
        let back: ElementRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert!(back.is_scroll_container());
    }

    #[test]
    fn select_capability_is_not_typeable() {
        let cap = ElementCapability {
            tag_name: "select".to_string(),
            ..Default::default()
        };
        assert!(cap.is_native_select());
        assert!(!cap.is_typeable());
    }

    #[test]
    fn submit_input_is_not_typeable() {
        let cap = ElementCapability {
            tag_name: "input".to_string(),
            input_type: Some("submit".to_string()),
            ..Default::default()
        };
        assert!(!cap.is_typeable());

        let text = ElementCapability {
            tag_name: "input".to_string(),
            input_type: Some("text".to_string()),
            ..Default::default()
        };
        assert!(text.is_typeable());
    }

    #[test]
    fn combobox_click_warrants_settle() {
        let cap = ElementCapability {
            tag_name: "div".to_string(),
            role: Some("combobox".to_string()),
            ..Default::default()
        };
        assert!(cap.warrants_settle_after_click());

        let link = ElementCapability {
            tag_name: "a".to_string(),
            ..Default::default()
        };
        assert!(!link.warrants_settle_after_click());
    }
}
