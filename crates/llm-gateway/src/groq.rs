//! OpenAI-compatible chat-completions client (Groq-hosted models).

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{InferenceClient, InferenceError};

/// Endpoint and model selection for the hosted inference service.
#[derive(Debug, Clone)]
pub struct GroqConfig {
    pub api_key: String,
    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,
    /// Model for text-only JSON completions (URL adaptation, jump-point
    /// analysis, starting-page planning).
    pub text_model: String,
    /// Vision-capable model for screenshot-grounded decisions.
    pub vision_model: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl GroqConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            text_model: "openai/gpt-oss-120b".to_string(),
            vision_model: "meta-llama/llama-4-maverick-17b-128e-instruct".to_string(),
            timeout_ms: 60_000,
        }
    }

    /// Builder: override the text model.
    pub fn text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = model.into();
        self
    }

    /// Builder: override the vision model.
    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.vision_model = model.into();
        self
    }
}

/// [`InferenceClient`] over the Groq chat-completions API.
pub struct GroqClient {
    config: GroqConfig,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl GroqClient {
    pub fn new(config: GroqConfig) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self { config, http })
    }

    async fn submit(&self, model: &str, content: Value) -> Result<String, InferenceError> {
        let body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": content }],
            "temperature": 0,
            "response_format": { "type": "json_object" },
        });

        debug!(model, "submitting JSON completion request");
        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "inference API refused request");
            return Err(InferenceError::api(status.as_u16(), body));
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(InferenceError::EmptyResponse)?;

        // The request asked for a JSON object; verify before handing the
        // payload to callers so malformed output is one typed failure.
        if serde_json::from_str::<Value>(content.trim()).is_err() {
            let snippet: String = content.chars().take(200).collect();
            return Err(InferenceError::MalformedPayload(snippet));
        }

        Ok(content)
    }
}

#[async_trait::async_trait]
impl InferenceClient for GroqClient {
    async fn complete_json(&self, prompt: &str) -> Result<String, InferenceError> {
        self.submit(&self.config.text_model, Value::String(prompt.to_string()))
            .await
    }

    async fn complete_json_with_image(
        &self,
        prompt: &str,
        jpeg_base64: &str,
    ) -> Result<String, InferenceError> {
        let content = json!([
            { "type": "text", "text": prompt },
            {
                "type": "image_url",
                "image_url": { "url": format!("data:image/jpeg;base64,{jpeg_base64}") }
            },
        ]);
        self.submit(&self.config.vision_model, content).await
    }
}
