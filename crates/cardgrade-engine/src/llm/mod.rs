//! Engine B: two-stage prompted grader.
//!
//! 1. *Gate*: the classification model labels each upload front/back/unknown
//!    and rates photo quality. Anything but one front plus one back, or a
//!    `low` quality rating, is a designed rejection.
//! 2. *Grade*: the grading model receives the upright 640×896 front then
//!    back and answers with the JSON contract in [`prompts`]. Replies are
//!    parsed leniently and pass through the observation guard.
//!
//! Transport failures surface as [`EngineError::Llm`] so the orchestrator
//! can retry; every other failure is a zero-score rejection.

pub mod parse;
pub mod preprocess;
pub mod prompts;

pub use parse::{GateVerdict, GradeReply, PhotoQuality, SideLabel, GEM_MINT_LABEL};

use std::sync::Arc;

use cardgrade_llm::{extract_json_object, ChatRequest, VisionClient};
use cardgrade_vision::{PreparedSide, QualityIssue};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{EngineError, EngineKind, EngineOutput, ScoringEngine, ScoringHints, SidePair};

pub const MSG_EXACTLY_ONE: &str = "Please upload exactly one FRONT and one BACK image.";
pub const MSG_LOW_QUALITY: &str = "Photo quality is too low (blur, glare or cropping).";
pub const MSG_FRONT_FIRST: &str = "Upload the FRONT image first and the BACK image second.";
pub const MSG_UNREADABLE: &str =
    "Could not read the grading response. Please retake the photos and try again.";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmGraderParams {
    pub grading_model: String,
    pub classify_model: String,
    pub grading_temperature: f32,
    pub classify_temperature: f32,
    /// Reject back-then-front instead of swapping.
    pub require_front_first: bool,
    pub jpeg_quality: u8,
    /// Long-side cap for images sent to the gate.
    pub gate_max_side: u32,
}

impl Default for LlmGraderParams {
    fn default() -> Self {
        Self {
            grading_model: "gpt-4o".to_string(),
            classify_model: "gpt-4o-mini".to_string(),
            grading_temperature: 0.2,
            classify_temperature: 0.0,
            require_front_first: false,
            jpeg_quality: 92,
            gate_max_side: 1024,
        }
    }
}

/// Why the gate refused a pair, if it did.
fn gate_rejection(verdict: &GateVerdict, require_front_first: bool) -> Option<&'static str> {
    if require_front_first {
        if !verdict.is_front_back() {
            return Some(MSG_FRONT_FIRST);
        }
    } else if !verdict.is_one_of_each() {
        return Some(MSG_EXACTLY_ONE);
    }
    if !verdict.quality.is_gradeable() {
        return Some(MSG_LOW_QUALITY);
    }
    None
}

pub struct LlmGrader {
    client: Arc<dyn VisionClient>,
    params: LlmGraderParams,
}

impl LlmGrader {
    pub fn new(client: Arc<dyn VisionClient>, params: LlmGraderParams) -> Self {
        Self { client, params }
    }

    pub fn params(&self) -> &LlmGraderParams {
        &self.params
    }

    fn classify(&self, pair: SidePair<'_>, hints: &ScoringHints) -> Result<(GateVerdict, serde_json::Value), EngineError> {
        let p = &self.params;
        let mut prompt = prompts::GATE_USER_PROMPT.to_string();
        let mut request = ChatRequest::new(p.classify_model.clone(), "")
            .with_system(prompts::gate_system_prompt(hints.game))
            .with_temperature(p.classify_temperature)
            .with_image(preprocess::gate_data_url(&pair.front.original, p.gate_max_side, p.jpeg_quality)?);
        match pair.back {
            Some(back) => {
                request = request.with_image(preprocess::gate_data_url(
                    &back.original,
                    p.gate_max_side,
                    p.jpeg_quality,
                )?);
            }
            None => prompt.push_str(prompts::GATE_MISSING_SECOND),
        }
        request.prompt = prompt;

        let text = self.client.complete(&request)?;
        let value = extract_json_object(&text).unwrap_or_else(|| {
            log::warn!("llm gate: reply is not JSON, treating as unknown/low");
            json!({})
        });
        Ok((GateVerdict::from_value(&value), value))
    }

    fn grade(&self, front: &PreparedSide, back: &PreparedSide, hints: &ScoringHints) -> Result<Option<serde_json::Value>, EngineError> {
        let p = &self.params;
        let request = ChatRequest::new(p.grading_model.clone(), prompts::GRADE_USER_PROMPT)
            .with_system(prompts::grade_system_prompt(hints.game))
            .with_temperature(p.grading_temperature)
            .with_image(preprocess::grade_data_url(&front.image, p.jpeg_quality)?)
            .with_image(preprocess::grade_data_url(&back.image, p.jpeg_quality)?);
        let text = self.client.complete(&request)?;
        Ok(extract_json_object(&text))
    }
}

impl ScoringEngine for LlmGrader {
    fn kind(&self) -> EngineKind {
        EngineKind::Llm
    }

    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all, fields(game = %hints.game)))]
    fn predict(&self, pair: SidePair<'_>, hints: &ScoringHints) -> Result<EngineOutput, EngineError> {
        let reject = |msg: &str, raw: serde_json::Value| {
            EngineOutput::rejected(EngineKind::Llm, msg).with_raw(raw)
        };

        if let Some(issue @ (QualityIssue::Blur | QualityIssue::Glare)) = pair.front.quality.issue {
            log::warn!("llm grader: front failed local {issue:?} check, not calling the model");
            return Ok(reject(
                MSG_LOW_QUALITY,
                json!({ "stage": "quality", "quality": pair.front.quality }),
            ));
        }

        let (verdict, gate_raw) = self.classify(pair, hints)?;
        log::info!(
            "llm gate: image_1={:?} image_2={:?} quality={:?}",
            verdict.image_1,
            verdict.image_2,
            verdict.quality
        );
        if let Some(msg) = gate_rejection(&verdict, self.params.require_front_first) {
            log::warn!("llm gate: rejected ({msg})");
            return Ok(reject(msg, json!({ "stage": "gate", "gate": gate_raw })));
        }

        let swapped = verdict.is_back_front();
        let (front, back) = match (swapped, pair.back) {
            (false, Some(back)) => (pair.front, back),
            (true, Some(back)) => {
                log::info!("llm gate: uploads are back-then-front, swapping");
                (back, pair.front)
            }
            // the gate only passes pairs with two images
            (_, None) => return Ok(reject(MSG_EXACTLY_ONE, json!({ "stage": "gate", "gate": gate_raw }))),
        };

        let Some(value) = self.grade(front, back, hints)? else {
            log::warn!("llm grader: grade reply is not JSON");
            return Ok(reject(MSG_UNREADABLE, json!({ "stage": "grade", "gate": gate_raw })));
        };
        let reply = GradeReply::from_value(&value).enforce_observation_guard();

        let mut out = if reply.needs_better_photos {
            let feedback = if reply.photo_feedback.is_empty() {
                MSG_LOW_QUALITY.to_string()
            } else {
                reply.photo_feedback.clone()
            };
            EngineOutput::rejected(EngineKind::Llm, feedback)
        } else {
            let mut out = EngineOutput::scored(EngineKind::Llm, reply.scores);
            out.photo_feedback = reply.photo_feedback.clone();
            out
        };
        out.observations = Some(reply.observations.clone());
        out.summary = reply.summary.clone();
        out.label = Some(reply.predicted_label.clone()).filter(|l| !l.is_empty());
        out.evidence_override = reply.evidence_override;
        out.sides_swapped = swapped;
        out.raw = json!({
            "stage": "grade",
            "gate": gate_raw,
            "reply": value,
            "dropped_observations": reply.dropped_observations,
            "evidence_override": reply.evidence_override,
        });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::side;
    use cardgrade_core::ScoreVector;
    use cardgrade_llm::{ScriptedReply, ScriptedVisionClient};
    use cardgrade_vision::QualityReport;
    use image::{Rgb, RgbImage};

    const GATE: &str = "intake checker";
    const GRADE: &str = "pre-grader";

    fn gate_reply(a: &str, b: &str, q: &str) -> ScriptedReply {
        ScriptedReply::text(format!(
            r#"{{"detected_sides":{{"image_1":"{a}","image_2":"{b}"}},"image_quality":"{q}"}}"#
        ))
    }

    fn card(v: u8) -> PreparedSide {
        side(RgbImage::from_pixel(63, 88, Rgb([v, v, v])))
    }

    fn grader(client: Arc<ScriptedVisionClient>) -> LlmGrader {
        LlmGrader::new(client, LlmGraderParams::default())
    }

    #[test]
    fn two_fronts_are_rejected_before_grading() {
        let client = Arc::new(ScriptedVisionClient::new().when(GATE, gate_reply("front", "front", "high")));
        let (f, b) = (card(200), card(180));
        let out = grader(client.clone())
            .predict(SidePair::new(&f, Some(&b)), &ScoringHints::default())
            .unwrap();
        assert!(out.needs_better_photos);
        assert_eq!(out.scores, ScoreVector::zero());
        assert!(out.photo_feedback.contains("exactly one FRONT and one BACK"));
        assert_eq!(client.call_count(), 1);
    }

    #[test]
    fn low_quality_gate_is_rejected() {
        let client = Arc::new(ScriptedVisionClient::new().when(GATE, gate_reply("front", "back", "low")));
        let (f, b) = (card(200), card(180));
        let out = grader(client).predict(SidePair::new(&f, Some(&b)), &ScoringHints::default()).unwrap();
        assert_eq!(out.photo_feedback, MSG_LOW_QUALITY);
    }

    #[test]
    fn missing_back_is_rejected() {
        let client = Arc::new(ScriptedVisionClient::new().when(GATE, gate_reply("front", "unknown", "high")));
        let f = card(200);
        let out = grader(client.clone()).predict(SidePair::new(&f, None), &ScoringHints::default()).unwrap();
        assert_eq!(out.photo_feedback, MSG_EXACTLY_ONE);
        assert!(client.requests()[0].prompt.contains("Second image is missing"));
    }

    #[test]
    fn back_front_is_swapped_and_graded() {
        let client = Arc::new(
            ScriptedVisionClient::new()
                .when(GATE, gate_reply("back", "front", "medium"))
                .when(
                    GRADE,
                    ScriptedReply::text(
                        r#"Here you go: {"scores":{"centering":9,"surface":8,"edges":"8.5","corners":8,"color":9},
                        "predicted_grade":8,"predicted_label":"NM-MT 8",
                        "observations":[{"category":"corners","side":"front","note":"soft top-right corner","box":[600,0,640,40]}],
                        "summary":"Light corner wear."}"#,
                    ),
                ),
        );
        let (f, b) = (card(60), card(200));
        let out = grader(client.clone())
            .predict(SidePair::new(&f, Some(&b)), &ScoringHints::default())
            .unwrap();
        assert!(out.sides_swapped);
        assert!(!out.needs_better_photos);
        assert_eq!(out.scores.edges, 8.5);
        assert_eq!(out.scores.overall, 8.0);
        assert_eq!(out.observations.as_ref().map(Vec::len), Some(1));
        assert_eq!(out.label.as_deref(), Some("NM-MT 8"));

        let reqs = client.requests();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[1].images.len(), 2);
        assert_eq!(reqs[1].model, "gpt-4o");
        assert_eq!(reqs[0].model, "gpt-4o-mini");
    }

    #[test]
    fn strict_order_rejects_back_first() {
        let client = Arc::new(ScriptedVisionClient::new().when(GATE, gate_reply("back", "front", "high")));
        let g = LlmGrader::new(
            client,
            LlmGraderParams {
                require_front_first: true,
                ..LlmGraderParams::default()
            },
        );
        let (f, b) = (card(60), card(200));
        let out = g.predict(SidePair::new(&f, Some(&b)), &ScoringHints::default()).unwrap();
        assert_eq!(out.photo_feedback, MSG_FRONT_FIRST);
    }

    #[test]
    fn no_observations_means_perfect() {
        let client = Arc::new(
            ScriptedVisionClient::new()
                .when(GATE, gate_reply("front", "back", "high"))
                .when(
                    GRADE,
                    ScriptedReply::text(
                        r#"{"scores":{"centering":7,"surface":6,"edges":7,"corners":7,"color":7},"predicted_grade":6.5,"observations":[]}"#,
                    ),
                ),
        );
        let (f, b) = (card(200), card(60));
        let out = grader(client).predict(SidePair::new(&f, Some(&b)), &ScoringHints::default()).unwrap();
        assert!(!out.needs_better_photos);
        assert_eq!(out.scores, ScoreVector::perfect());
        assert!(out.evidence_override);
        assert_eq!(out.observations, Some(Vec::new()));
    }

    #[test]
    fn garbage_grade_reply_is_unreadable() {
        let client = Arc::new(
            ScriptedVisionClient::new()
                .when(GATE, gate_reply("front", "back", "high"))
                .when(GRADE, ScriptedReply::text("I cannot grade this card.")),
        );
        let (f, b) = (card(200), card(60));
        let out = grader(client).predict(SidePair::new(&f, Some(&b)), &ScoringHints::default()).unwrap();
        assert_eq!(out.photo_feedback, MSG_UNREADABLE);
        assert_eq!(out.scores, ScoreVector::zero());
    }

    #[test]
    fn blurry_front_never_reaches_the_model() {
        let client = Arc::new(ScriptedVisionClient::new());
        let mut f = card(200);
        f.quality = QualityReport {
            ok: false,
            issue: Some(QualityIssue::Blur),
            reason: Some("blurry".into()),
            ..f.quality
        };
        let b = card(60);
        let out = grader(client.clone()).predict(SidePair::new(&f, Some(&b)), &ScoringHints::default()).unwrap();
        assert_eq!(out.photo_feedback, MSG_LOW_QUALITY);
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn transport_failure_is_transient_error() {
        let client = Arc::new(ScriptedVisionClient::new().when(GATE, ScriptedReply::Fail("reset".into())));
        let (f, b) = (card(200), card(60));
        let err = grader(client).predict(SidePair::new(&f, Some(&b)), &ScoringHints::default()).unwrap_err();
        assert!(err.is_transient());
    }
}
