use cardgrade_engine::{EngineError, ModelError};
use cardgrade_llm::LlmError;

use crate::config::ConfigError;
use crate::upload::UploadError;

/// Failures that abort a grading attempt or the construction of a grader.
#[derive(thiserror::Error, Debug)]
pub enum GradeError {
    #[error("front image: {0}")]
    Front(#[source] UploadError),

    #[error("scoring failed after {attempts} attempt(s): {source}")]
    Engine {
        attempts: u32,
        #[source]
        source: EngineError,
    },

    #[error("grading worker panicked in {0}")]
    Worker(&'static str),

    #[error("engine not available: {0}")]
    EngineUnavailable(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GradeError {
    /// Short guidance shown in place of a grade.
    pub fn user_message(&self) -> String {
        match self {
            GradeError::Front(UploadError::TooLarge { .. }) => {
                "The front image is too large. Please upload a photo under 12 MB.".to_string()
            }
            GradeError::Front(UploadError::UnsupportedFormat) => {
                "The front image must be a JPEG, PNG or WebP photo.".to_string()
            }
            GradeError::Front(_) => {
                "The front image could not be read. Please upload it again.".to_string()
            }
            _ => "Grading is temporarily unavailable. Please try again later.".to_string(),
        }
    }
}
