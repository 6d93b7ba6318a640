use std::fmt;
use std::str::FromStr;

use cardgrade_core::{Game, Observation, ScoreVector};
use cardgrade_vision::PreparedSide;
use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Which scoring engine a grader runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    #[default]
    Regressor,
    Llm,
}

impl EngineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Regressor => "regressor",
            EngineKind::Llm => "llm",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown engine '{0}' (expected regressor or llm)")]
pub struct ParseEngineError(pub String);

impl FromStr for EngineKind {
    type Err = ParseEngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regressor" | "cv" | "model" => Ok(EngineKind::Regressor),
            "llm" | "ai" | "openai" => Ok(EngineKind::Llm),
            _ => Err(ParseEngineError(s.to_string())),
        }
    }
}

/// Front (required) and back (optional) of one card, already prepared.
#[derive(Clone, Copy, Debug)]
pub struct SidePair<'a> {
    pub front: &'a PreparedSide,
    pub back: Option<&'a PreparedSide>,
}

impl<'a> SidePair<'a> {
    pub fn new(front: &'a PreparedSide, back: Option<&'a PreparedSide>) -> Self {
        Self { front, back }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringHints {
    pub game: Game,
}

/// What an engine reports, before reconciliation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineOutput {
    pub engine: EngineKind,
    pub scores: ScoreVector,
    pub needs_better_photos: bool,
    pub photo_feedback: String,
    /// `None` when the engine does not cite evidence (the regressor).
    pub observations: Option<Vec<Observation>>,
    pub summary: String,
    pub label: Option<String>,
    /// Scores were forced to perfect because no concrete evidence was cited.
    pub evidence_override: bool,
    /// The engine decided the uploads were back-then-front.
    pub sides_swapped: bool,
    pub raw: serde_json::Value,
}

impl EngineOutput {
    pub fn scored(engine: EngineKind, scores: ScoreVector) -> Self {
        Self {
            engine,
            scores: scores.clamped(),
            needs_better_photos: false,
            photo_feedback: String::new(),
            observations: None,
            summary: String::new(),
            label: None,
            evidence_override: false,
            sides_swapped: false,
            raw: serde_json::Value::Null,
        }
    }

    /// A designed rejection: zero scores plus guidance.
    pub fn rejected(engine: EngineKind, feedback: impl Into<String>) -> Self {
        Self {
            needs_better_photos: true,
            photo_feedback: feedback.into(),
            ..Self::scored(engine, ScoreVector::zero())
        }
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }
}

/// A score predictor. Implementations are shared across concurrent attempts.
pub trait ScoringEngine: Send + Sync {
    fn kind(&self) -> EngineKind;

    fn predict(&self, pair: SidePair<'_>, hints: &ScoringHints) -> Result<EngineOutput, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_kind_parses_aliases() {
        assert_eq!("cv".parse::<EngineKind>(), Ok(EngineKind::Regressor));
        assert_eq!("AI".parse::<EngineKind>(), Ok(EngineKind::Llm));
        assert!("magic".parse::<EngineKind>().is_err());
    }

    #[test]
    fn rejection_is_zero_and_flagged() {
        let out = EngineOutput::rejected(EngineKind::Llm, "retake");
        assert!(out.needs_better_photos);
        assert_eq!(out.scores, ScoreVector::zero());
        assert_eq!(out.photo_feedback, "retake");
    }
}
