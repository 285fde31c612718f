//! Deterministic inference client for tests and offline development.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::{InferenceClient, InferenceError};

/// Replays queued responses in order; optionally repeats a default response
/// once the queue is drained. Records every prompt it sees so tests can
/// assert on what was asked.
#[derive(Debug, Default)]
pub struct ScriptedInference {
    queue: Mutex<VecDeque<String>>,
    default_response: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedInference {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one response (FIFO).
    pub fn push_response(&self, response: impl Into<String>) {
        self.queue.lock().unwrap().push_back(response.into());
    }

    /// Builder: respond with `response` whenever the queue is empty.
    pub fn with_default(mut self, response: impl Into<String>) -> Self {
        self.default_response = Some(response.into());
        self
    }

    /// Every prompt submitted so far, in order.
    pub fn seen_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next(&self, prompt: &str) -> Result<String, InferenceError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(queued) = self.queue.lock().unwrap().pop_front() {
            return Ok(queued);
        }
        self.default_response
            .clone()
            .ok_or(InferenceError::EmptyResponse)
    }
}

#[async_trait::async_trait]
impl InferenceClient for ScriptedInference {
    async fn complete_json(&self, prompt: &str) -> Result<String, InferenceError> {
        self.next(prompt)
    }

    async fn complete_json_with_image(
        &self,
        prompt: &str,
        _jpeg_base64: &str,
    ) -> Result<String, InferenceError> {
        self.next(prompt)
    }
}
