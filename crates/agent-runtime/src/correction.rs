//! Pre-dispatch correction policy.
//!
//! The inference service decides from pixels and summaries; what an element
//! actually is only becomes known when the driver looks at it. This module
//! maps (requested action, observed capability) onto the action the
//! dispatcher actually executes, as a pure function so the policy is
//! testable without a browser.

use wayfinder_core_types::{AgentAction, ElementCapability, ScrollDirection};

/// The action to execute after reconciling the request with the element.
#[derive(Debug, Clone, PartialEq)]
pub enum CorrectedAction {
    Navigate {
        url: String,
    },
    Click {
        element_id: u32,
        /// Clicks on buttons/comboboxes swap displayed content and warrant
        /// post-action normalization.
        settle: bool,
    },
    /// Click requested on a native `<select>` with a value available:
    /// clicking cannot open native selection widgets, so select instead.
    SelectFromClick {
        element_id: u32,
        value: String,
    },
    /// Click requested on a native `<select>` without a value: do not
    /// guess; record the omission for the next decision round.
    SelectNeedsValue {
        element_id: u32,
    },
    Type {
        element_id: u32,
        value: String,
    },
    /// Type requested on a non-typeable control: click it instead.
    ClickFromType {
        element_id: u32,
    },
    Select {
        element_id: u32,
        value: String,
    },
    PressEnter,
    Scroll {
        direction: ScrollDirection,
    },
    ScrollElement {
        element_id: u32,
        direction: ScrollDirection,
    },
    /// The targeted element vanished between tagging and dispatch;
    /// recoverable, the loop re-observes next step.
    SkipMissingElement {
        element_id: u32,
    },
}

impl CorrectedAction {
    /// Whether this action warrants post-action normalization (bounded
    /// network-quiet wait, then scroll to top). Scrolls never settle:
    /// container and page scrolling are deliberate viewport moves, not
    /// content changes.
    pub fn needs_settle(&self) -> bool {
        match self {
            CorrectedAction::Navigate { .. }
            | CorrectedAction::SelectFromClick { .. }
            | CorrectedAction::SelectNeedsValue { .. }
            | CorrectedAction::ClickFromType { .. }
            | CorrectedAction::Select { .. }
            | CorrectedAction::PressEnter => true,
            CorrectedAction::Click { settle, .. } => *settle,
            CorrectedAction::Type { .. }
            | CorrectedAction::Scroll { .. }
            | CorrectedAction::ScrollElement { .. }
            | CorrectedAction::SkipMissingElement { .. } => false,
        }
    }
}

/// Map a requested action plus the observed element capability onto the
/// corrected action. `capability` is `None` when the action targets an
/// element the driver can no longer find (or targets nothing).
pub fn correct(action: &AgentAction, capability: Option<&ElementCapability>) -> CorrectedAction {
    match action {
        AgentAction::Navigate { url } => CorrectedAction::Navigate { url: url.clone() },
        AgentAction::PressEnter => CorrectedAction::PressEnter,
        AgentAction::Scroll { direction } => CorrectedAction::Scroll {
            direction: *direction,
        },

        AgentAction::Click { element_id, value } => match capability {
            None => CorrectedAction::SkipMissingElement {
                element_id: *element_id,
            },
            Some(cap) if cap.is_native_select() => match value {
                Some(value) => CorrectedAction::SelectFromClick {
                    element_id: *element_id,
                    value: value.clone(),
                },
                None => CorrectedAction::SelectNeedsValue {
                    element_id: *element_id,
                },
            },
            Some(cap) => CorrectedAction::Click {
                element_id: *element_id,
                settle: cap.warrants_settle_after_click(),
            },
        },

        AgentAction::Type { element_id, value } => match capability {
            None => CorrectedAction::SkipMissingElement {
                element_id: *element_id,
            },
            Some(cap) if !cap.is_typeable() => CorrectedAction::ClickFromType {
                element_id: *element_id,
            },
            Some(_) => CorrectedAction::Type {
                element_id: *element_id,
                value: value.clone(),
            },
        },

        AgentAction::Select { element_id, value } => match capability {
            None => CorrectedAction::SkipMissingElement {
                element_id: *element_id,
            },
            Some(_) => CorrectedAction::Select {
                element_id: *element_id,
                value: value.clone(),
            },
        },

        AgentAction::ScrollElement {
            element_id,
            direction,
        } => match capability {
            None => CorrectedAction::SkipMissingElement {
                element_id: *element_id,
            },
            Some(_) => CorrectedAction::ScrollElement {
                element_id: *element_id,
                direction: *direction,
            },
        },

        // Terminal and error kinds never reach dispatch; mapping them to a
        // skip keeps the function total without a panic path.
        AgentAction::Finished | AgentAction::Error { .. } => {
            CorrectedAction::SkipMissingElement { element_id: 0 }
        }
    }
}
