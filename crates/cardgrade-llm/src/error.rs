#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    #[error("no API key configured for {0}")]
    MissingApiKey(String),

    #[error("cannot reach vision endpoint at {0}")]
    Connection(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("vision endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("vision endpoint returned no message content")]
    EmptyResponse,

    #[error("reply is not a JSON object: {0}")]
    NotJson(String),

    #[error("scripted client has no reply left for this request")]
    ScriptExhausted,

    #[error("scripted transport failure: {0}")]
    Scripted(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl LlmError {
    /// Transport-level failures that a caller may retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::Connection(_)
                | LlmError::Timeout(_)
                | LlmError::Scripted(_)
                | LlmError::Http(_)
        ) || matches!(self, LlmError::Status { status, .. } if *status == 429 || *status >= 500)
    }
}
