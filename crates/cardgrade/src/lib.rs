//! High-level facade crate for the `cardgrade-*` workspace.
//!
//! This crate provides:
//! - re-exports of the stage crates (geometry and score types, image stages,
//!   scoring engines, card identity, vision-language clients);
//! - the [`Grader`] that runs one grading attempt end to end and never fails:
//!   unusable input comes back as a zero-score outcome with photo feedback;
//! - result reconciliation, labels and summaries on top of engine scores;
//! - JSON configuration with environment overrides ([`GraderConfig`]).
//!
//! ## Quickstart
//!
//! ```no_run
//! use cardgrade::{GradeInput, Grader, GraderConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = GraderConfig::default();
//! config.apply_env();
//! let grader = Grader::from_config(config)?;
//!
//! let front = std::fs::read("front.jpg")?;
//! let back = std::fs::read("back.jpg")?;
//! let outcome = grader.grade(&GradeInput::new(front).with_back(back));
//! println!("{} {:.1}", outcome.label, outcome.scores.overall);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `cardgrade::core`: score vectors, observations, detector signals, geometry.
//! - `cardgrade::vision`: rectification, quality, color, detectors.
//! - `cardgrade::engine`: the regressor and LLM scoring engines.
//! - `cardgrade::identity`: set codes, metadata cache, card database, strip OCR.
//! - `cardgrade::llm`: vision-language client trait and the OpenAI client.
//!
//! ## Features
//! - `cli` (default): the `cardgrade` binary.
//! - `onnx`: load regressor weights with ONNX Runtime.
//! - `tracing`: spans on hot paths and a `tracing-subscriber` logger.

pub use cardgrade_core as core;
pub use cardgrade_engine as engine;
pub use cardgrade_identity as identity;
pub use cardgrade_llm as llm;
pub use cardgrade_vision as vision;

mod config;
mod error;
mod labels;
mod pipeline;
mod reconcile;
mod record;
mod summary;
mod upload;

pub use cardgrade_core::{Game, Observation, ScoreVector};
pub use cardgrade_engine::EngineKind;
pub use cardgrade_identity::{CardIdentity, IdentityHints};

pub use config::{
    ConfigError, EngineSection, GraderConfig, IdentitySection, LlmSection, QualitySection,
    RegressorSection,
};
pub use error::GradeError;
pub use labels::{grade_bucket, grade_label};
pub use pipeline::{GradeInput, GradeOutcome, GradeStage, Grader};
pub use reconcile::{reconcile, ReconcileParams, Reconciled, SCRIBBLE_NOTE, UNGRADED_LABEL};
pub use record::{GradeRecord, FEEDBACK_MAX_CHARS};
pub use summary::compose_summary;
pub use upload::{decode_upload, validate_upload, UploadError, MAX_UPLOAD_BYTES};

/// Install a `tracing` subscriber and route `log` records into it.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    cardgrade_core::init_tracing(json);
    // Already installed when tracing-subscriber carries its own log bridge.
    let _ = tracing_log::LogTracer::init();
}
