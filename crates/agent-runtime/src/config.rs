//! Configuration for the control loop.

use serde::{Deserialize, Serialize};

/// Tunables for one agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Step ceiling; the loop's sole forced-termination path.
    /// Default: 30
    pub max_steps: u32,

    /// How many recent history entries the decision step sees.
    /// Default: 5
    pub history_window: usize,

    /// Whether to capture screenshots and use the vision model.
    /// Default: true
    pub enable_vision: bool,

    /// JPEG quality for decision screenshots.
    /// Default: 50
    pub screenshot_quality: u8,

    /// Pixel delta for whole-page scrolls.
    /// Default: 800
    pub page_scroll_px: i64,

    /// Pixel delta for scroll-container scrolls.
    /// Default: 400
    pub container_scroll_px: i64,

    /// Bound on the post-action network-quiescence wait, in milliseconds.
    /// Timeout is absorbed, never propagated.
    /// Default: 5000
    pub settle_quiet_ms: u64,

    /// Bound on the per-step DOM-ready wait, in milliseconds.
    /// Default: 10000
    pub dom_ready_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 30,
            history_window: 5,
            enable_vision: true,
            screenshot_quality: 50,
            page_scroll_px: 800,
            container_scroll_px: 400,
            settle_quiet_ms: 5_000,
            dom_ready_ms: 10_000,
        }
    }
}

impl AgentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the step ceiling.
    pub fn max_steps(mut self, steps: u32) -> Self {
        self.max_steps = steps;
        self
    }

    /// Builder: toggle vision mode.
    pub fn vision(mut self, enabled: bool) -> Self {
        self.enable_vision = enabled;
        self
    }

    /// Builder: set the history window.
    pub fn history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_loop_contract() {
        let config = AgentConfig::default();
        assert_eq!(config.max_steps, 30);
        assert_eq!(config.history_window, 5);
        assert!(config.enable_vision);
        assert_eq!(config.page_scroll_px, 800);
        assert_eq!(config.container_scroll_px, 400);
    }

    #[test]
    fn builder_overrides() {
        let config = AgentConfig::new().max_steps(5).vision(false).history_window(3);
        assert_eq!(config.max_steps, 5);
        assert!(!config.enable_vision);
        assert_eq!(config.history_window, 3);
    }
}
