use thiserror::Error;

/// Errors emitted by the session-memory crate.
///
/// Adaptation failures and gate misses are NOT errors; they are normal
/// `fallback` results. These variants cover genuine store/transport/disk
/// trouble only.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("vector store transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("vector store API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("vector store payload error: {0}")]
    Payload(String),

    #[error("artifact read error: {0}")]
    Io(#[from] std::io::Error),
}

impl MemoryError {
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload(message.into())
    }
}
