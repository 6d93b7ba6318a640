//! Interchangeable scoring engines for card grading.
//!
//! Both engines implement [`ScoringEngine`] and report through the common
//! [`cardgrade_core::ScoreVector`]; which one runs is configuration.
//!
//! - [`regressor::RegressorEngine`]: a pair regressor over a 6-channel
//!   front+back tensor, with an analytic edge fallback and an overall guard.
//!   The ONNX backend sits behind the `onnx` feature; [`regressor::FixedModel`]
//!   serves dry runs.
//! - [`llm::LlmGrader`]: a gate stage (sides and photo quality) followed by a
//!   structured grading prompt, with the "no observation, no deduction" guard.

mod engine;
mod error;
pub mod llm;
pub mod regressor;

pub use engine::{
    EngineKind, EngineOutput, ParseEngineError, ScoringEngine, ScoringHints, SidePair,
};
pub use error::{EngineError, ModelError};
pub use llm::{LlmGrader, LlmGraderParams};
pub use regressor::{EdgeFallbackMode, RegressorEngine, RegressorParams};

#[cfg(test)]
pub(crate) mod test_support {
    use cardgrade_vision::{CanvasSource, PreparedSide, QualityReport};
    use image::RgbImage;

    /// A prepared side whose canvas is `img` itself.
    pub fn side(img: RgbImage) -> PreparedSide {
        PreparedSide {
            original: img.clone(),
            image: img,
            source: CanvasSource::Letterbox {
                reason: "test".into(),
            },
            quality: QualityReport {
                ok: true,
                issue: None,
                reason: None,
                blur_variance: 500.0,
                glare_ratio: 0.0,
                min_side: 1000,
            },
        }
    }
}
