//! Inference-service collaborator.
//!
//! Everything the agent and the session cache ask a model for goes through
//! [`InferenceClient`]: a JSON-object completion, optionally grounded in a
//! page screenshot. Requests are deterministic (zero temperature) because
//! the decision space is a small enumerated action set; repeatability wins
//! over creativity.

mod errors;
mod groq;
mod scripted;

pub use errors::InferenceError;
pub use groq::{GroqClient, GroqConfig};
pub use scripted::ScriptedInference;

use async_trait::async_trait;

/// JSON-mode completion seam over the hosted inference endpoints.
///
/// Implementations must surface malformed or non-JSON payloads as
/// [`InferenceError`]s, never panic: callers absorb failures into
/// `error`-kind decisions or cache fallbacks.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Submit a text prompt; returns the raw JSON object payload.
    async fn complete_json(&self, prompt: &str) -> Result<String, InferenceError>;

    /// Submit a text prompt plus a JPEG screenshot (base64, no data-URL
    /// prefix); returns the raw JSON object payload.
    async fn complete_json_with_image(
        &self,
        prompt: &str,
        jpeg_base64: &str,
    ) -> Result<String, InferenceError>;
}
