//! Browser driver collaborator.
//!
//! [`PageDriver`] is the seam the agent runtime talks through: navigation,
//! in-page evaluation, screenshots, bounded waits, and element operations
//! addressed by the persisted tag identifier. [`CdpDriver`] implements it
//! over the Chromium DevTools Protocol with the human-mimicry pacing the
//! rest of the system assumes.

mod chrome;
mod errors;
pub mod humanize;

pub use chrome::{CdpDriver, DriverConfig};
pub use errors::DriverError;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use wayfinder_core_types::ElementCapability;

/// Result of a typing operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeOutcome {
    /// An autocomplete/suggestion popup opened while typing. The caller
    /// must skip the blur-and-commit step so the popup stays open.
    pub autocomplete_open: bool,
}

/// Driver seam consumed by the agent runtime.
///
/// Element operations take the integer identifier a tagging pass persisted
/// onto the node; the driver derives the selector itself. All waits are
/// bounded; callers absorb their timeouts.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    /// Evaluate a script in the page; `null` when it yields no value.
    async fn evaluate(&self, script: &str) -> Result<Value, DriverError>;

    async fn screenshot_jpeg(&self, quality: u8) -> Result<Vec<u8>, DriverError>;

    async fn wait_dom_ready(&self, timeout: Duration) -> Result<(), DriverError>;

    /// Wait until network activity looks quiet for a short window.
    async fn wait_network_quiet(&self, timeout: Duration) -> Result<(), DriverError>;

    async fn press_enter(&self) -> Result<(), DriverError>;

    async fn element_exists(&self, element_id: u32) -> Result<bool, DriverError>;

    /// Observe tag name, role and input type ahead of dispatch correction.
    async fn describe_element(&self, element_id: u32) -> Result<ElementCapability, DriverError>;

    /// Human-like click: scroll into view, settle, move, click.
    async fn click_element(&self, element_id: u32) -> Result<(), DriverError>;

    /// Human-like typing: clear, then char-at-a-time input. Reports whether
    /// an autocomplete popup opened mid-typing.
    async fn type_into_element(&self, element_id: u32, text: &str)
        -> Result<TypeOutcome, DriverError>;

    /// Native option selection by value or label.
    async fn select_option(&self, element_id: u32, value: &str) -> Result<(), DriverError>;

    /// Scroll a container element by a signed pixel delta, hovering first.
    async fn scroll_container(&self, element_id: u32, delta_y: i64) -> Result<(), DriverError>;

    async fn scroll_page(&self, delta_y: i64) -> Result<(), DriverError>;

    async fn scroll_to_top(&self) -> Result<(), DriverError>;

    /// Human-mimicry pause with jitter. Test drivers override to a no-op.
    async fn pace(&self, min_ms: u64, max_ms: u64) {
        humanize::random_delay(min_ms, max_ms).await;
    }
}
