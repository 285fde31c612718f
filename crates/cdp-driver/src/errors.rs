use thiserror::Error;

/// Errors emitted by the browser driver.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    #[error("screenshot failed: {0}")]
    Screenshot(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("option not found: {0}")]
    OptionNotFound(String),

    #[error("element is not typeable: {0}")]
    NotTypeable(String),

    #[error("input dispatch failed: {0}")]
    Input(String),

    #[error("wait timed out: {0}")]
    WaitTimeout(String),

    #[error("cdp transport error: {0}")]
    Transport(String),
}

impl DriverError {
    /// Helper for element-not-found failures keyed by tag identifier.
    pub fn missing_element(element_id: u32) -> Self {
        Self::ElementNotFound(format!("no element carries tag id {element_id}"))
    }
}
