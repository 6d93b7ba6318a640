use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::GradeOutcome;

pub const FEEDBACK_MAX_CHARS: usize = 300;

/// The persisted form of a finished grading attempt.
///
/// Built only from a [`GradeOutcome`]; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradeRecord {
    pub user_id: Option<u64>,
    pub card_name: Option<String>,
    pub centering: f32,
    pub surface: f32,
    pub edges: f32,
    pub corners: f32,
    pub color: f32,
    pub predicted_grade: f32,
    pub predicted_label: String,
    /// Markdown.
    pub explanation: String,
    pub needs_better_photos: bool,
    pub photo_feedback: String,
    pub raw_result: Value,
    /// Seconds since the UNIX epoch.
    pub created_at: u64,
}

fn one_decimal(v: f32) -> f32 {
    (v.clamp(0.0, 10.0) * 10.0).round() / 10.0
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

impl GradeRecord {
    pub fn from_outcome(outcome: &GradeOutcome, user_id: Option<u64>) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self::from_outcome_at(outcome, user_id, created_at)
    }

    pub fn from_outcome_at(outcome: &GradeOutcome, user_id: Option<u64>, created_at: u64) -> Self {
        let s = &outcome.scores;
        let raw_result = serde_json::json!({
            "engine": outcome.engine,
            "identity": outcome.identity,
            "observations": outcome.observations,
            "stages": outcome.stages,
            "diagnostics": outcome.raw,
        });
        Self {
            user_id,
            card_name: outcome.identity.card_name.clone(),
            centering: one_decimal(s.centering),
            surface: one_decimal(s.surface),
            edges: one_decimal(s.edges),
            corners: one_decimal(s.corners),
            color: one_decimal(s.color),
            predicted_grade: one_decimal(s.overall),
            predicted_label: outcome.label.clone(),
            explanation: outcome.summary.clone(),
            needs_better_photos: outcome.needs_better_photos,
            photo_feedback: truncate_chars(&outcome.photo_feedback, FEEDBACK_MAX_CHARS),
            raw_result,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardgrade_core::ScoreVector;
    use cardgrade_engine::EngineKind;
    use cardgrade_identity::CardIdentity;

    fn outcome(scores: ScoreVector, feedback: &str) -> GradeOutcome {
        GradeOutcome {
            engine: EngineKind::Regressor,
            scores,
            label: "NM-MT (Near Mint-Mint)".into(),
            summary: "**Overall 8.4**".into(),
            needs_better_photos: false,
            photo_feedback: feedback.into(),
            observations: Vec::new(),
            identity: CardIdentity {
                card_name: Some("Pikachu".into()),
                ..CardIdentity::default()
            },
            stages: Vec::new(),
            raw: Value::Null,
        }
    }

    #[test]
    fn scores_are_rounded_to_one_decimal() {
        let s = ScoreVector::from_array([8.46, 7.04, 9.96, 6.0, 10.0, 8.44]);
        let rec = GradeRecord::from_outcome_at(&outcome(s, ""), Some(7), 1_700_000_000);
        assert_eq!(rec.centering, 8.5);
        assert_eq!(rec.surface, 7.0);
        assert_eq!(rec.edges, 10.0);
        assert_eq!(rec.predicted_grade, 8.4);
        assert_eq!(rec.card_name.as_deref(), Some("Pikachu"));
        assert_eq!(rec.user_id, Some(7));
        assert_eq!(rec.created_at, 1_700_000_000);
        assert_eq!(rec.raw_result["engine"], "regressor");
    }

    #[test]
    fn feedback_is_truncated_on_char_boundaries() {
        let long = "é".repeat(400);
        let rec = GradeRecord::from_outcome(&outcome(ScoreVector::uniform(9.0), &long), None);
        assert_eq!(rec.photo_feedback.chars().count(), FEEDBACK_MAX_CHARS);
        assert!(rec.created_at > 0);
    }
}
