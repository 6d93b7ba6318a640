use std::path::PathBuf;

use cardgrade_llm::LlmError;

#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("model metadata {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("model outputs {found:?} do not match score order {expected:?}")]
    OutputOrder {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("input tensor has {found} values, expected {expected}")]
    InputShape { expected: usize, found: usize },

    #[error("model produced {0} values, expected 6")]
    OutputShape(usize),

    #[error("model backend: {0}")]
    Backend(String),

    #[error("model session lock poisoned")]
    Poisoned,
}

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl EngineError {
    /// Failures worth another attempt (network hiccups, rate limits).
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Llm(e) => e.is_transient(),
            EngineError::Model(_) => false,
        }
    }
}
