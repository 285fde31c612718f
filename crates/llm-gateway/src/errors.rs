use thiserror::Error;

/// Errors emitted by the inference gateway.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Transport-level failure reaching the endpoint.
    #[error("inference transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("inference API error (status {status}): {body}")]
    Api { status: u16, body: String },

    /// The completion arrived without usable content.
    #[error("inference response carried no content")]
    EmptyResponse,

    /// The completion's content is not the JSON object the request asked for.
    #[error("inference response is not a JSON object: {0}")]
    MalformedPayload(String),
}

impl InferenceError {
    /// Helper for API-status failures.
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }
}
