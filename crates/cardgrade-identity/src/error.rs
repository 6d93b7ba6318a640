use std::path::PathBuf;

use cardgrade_llm::LlmError;

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("cache lock poisoned")]
    Poisoned,
}

#[derive(thiserror::Error, Debug)]
pub enum IdentityError {
    #[error("card database returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("card database request timed out after {0}s")]
    Timeout(u64),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("feature description failed: {0}")]
    Descriptor(String),
}
